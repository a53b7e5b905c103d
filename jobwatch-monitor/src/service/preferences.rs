//! Page-size preferences
//!
//! The page size is the only piece of view state that survives a session.
//! Sizes are kept in one JSON object keyed by view, so every view type
//! remembers its own density.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

/// Identifies a view type for preference storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKey {
    GcHistory,
    AuditLogPurgeHistory,
    ReplicationExecutions,
    WebhookExecutions,
}

impl ViewKey {
    /// Key under which the view's page size is stored
    pub fn as_str(self) -> &'static str {
        match self {
            ViewKey::GcHistory => "GcHistoryComponent",
            ViewKey::AuditLogPurgeHistory => "AuditLogPurgeHistoryComponent",
            ViewKey::ReplicationExecutions => "ListReplicationRuleComponentExecutions",
            ViewKey::WebhookExecutions => "WebhookComponent",
        }
    }
}

impl std::fmt::Display for ViewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable map of page sizes per view
pub struct PageSizePrefs {
    path: Option<PathBuf>,
    sizes: Mutex<HashMap<String, usize>>,
}

impl PageSizePrefs {
    /// Preferences that live only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sizes: Mutex::new(HashMap::new()),
        }
    }

    /// Preferences backed by a JSON file
    ///
    /// A missing file starts empty. An unreadable or malformed file is
    /// logged and also starts empty; it is overwritten on the next `set`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sizes = load_sizes(&path);
        Self {
            path: Some(path),
            sizes: Mutex::new(sizes),
        }
    }

    /// Stored page size for `view`, or `default` when none is stored
    pub fn get(&self, view: ViewKey, default: usize) -> usize {
        let sizes = self.sizes.lock().unwrap_or_else(PoisonError::into_inner);
        sizes
            .get(view.as_str())
            .copied()
            .filter(|size| *size > 0)
            .unwrap_or(default)
    }

    /// Stores the page size for `view`
    ///
    /// A zero size is ignored. The file is written while the map is still
    /// locked, so writes land in the same order as the updates.
    pub fn set(&self, view: ViewKey, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Ok(());
        }

        let mut sizes = self.sizes.lock().unwrap_or_else(PoisonError::into_inner);
        sizes.insert(view.as_str().to_string(), page_size);

        match &self.path {
            Some(path) => save_sizes(path, &sizes),
            None => Ok(()),
        }
    }
}

fn load_sizes(path: &Path) -> HashMap<String, usize> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return HashMap::new();
        }
        Err(err) => {
            warn!("Failed to read page size preferences from {:?}: {}", path, err);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(sizes) => {
            debug!("Loaded page size preferences from {:?}", path);
            sizes
        }
        Err(err) => {
            warn!("Failed to parse page size preferences from {:?}: {}", path, err);
            HashMap::new()
        }
    }
}

fn save_sizes(path: &Path, sizes: &HashMap<String, usize>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| MonitorError::Preferences(format!("{}: {}", parent.display(), e)))?;
    }

    let content = serde_json::to_string_pretty(sizes)
        .map_err(|e| MonitorError::Preferences(e.to_string()))?;

    // Write then rename so a crash never leaves a truncated file behind
    let staging = path.with_extension("tmp");
    fs::write(&staging, content)
        .and_then(|_| fs::rename(&staging, path))
        .map_err(|e| MonitorError::Preferences(format!("{}: {}", path.display(), e)))
}
