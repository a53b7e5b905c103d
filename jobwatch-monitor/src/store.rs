//! Paginated job store
//!
//! Per-view state of one monitored directory: the page descriptor, the
//! materialized jobs, the user's selection and the loading flag.
//!
//! The store knows two refresh disciplines and never mixes them:
//!
//! - **replace** ([`JobStore::replace_fetch`]) is user-driven. It raises
//!   `loading`, swaps the whole row set, takes `total` from the response
//!   and clears the selection.
//! - **merge** ([`JobStore::merge_fetch`]) is poll-driven. It is silent and
//!   only rewrites the mutable fields (`status`, `update_time`,
//!   `parameters`) of rows that are already materialized. Rows are never
//!   added, removed or reordered, and page, total and selection are left
//!   alone, so a background refresh is invisible to whatever the user is
//!   doing.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jobwatch_core::domain::job::{Job, JobId};
use jobwatch_core::domain::page::{JobFilter, PageDescriptor, SortOrder};
use tracing::debug;

use crate::repository::JobDirectory;
use crate::service::{ErrorSink, PageSizePrefs, ViewKey};

/// Result of one fetch against the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response was applied to the store
    Applied {
        /// Whether the fetched set contains a non-terminal job
        active: bool,
    },
    /// The directory call failed; the error went to the error sink
    Failed,
    /// Another merge from this store was still in flight
    Skipped,
    /// The response arrived for a superseded request or a disposed store
    Discarded,
}

impl FetchOutcome {
    /// Whether polling should be armed after this fetch
    pub fn found_active(self) -> bool {
        matches!(self, FetchOutcome::Applied { active: true })
    }
}

/// Point-in-time copy of a store, for rendering
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub page: PageDescriptor,
    pub jobs: Vec<Job>,
    pub selection: BTreeSet<JobId>,
    pub loading: bool,
}

struct StoreState {
    page: PageDescriptor,
    jobs: Vec<Job>,
    selection: BTreeSet<JobId>,
    loading: bool,
    /// Bumped by every replace; only the latest replace may apply
    replace_generation: u64,
}

/// Mutable state of one monitored view
pub struct JobStore {
    view: ViewKey,
    directory: Arc<dyn JobDirectory>,
    errors: Arc<dyn ErrorSink>,
    prefs: Arc<PageSizePrefs>,
    state: Mutex<StoreState>,
    merge_in_flight: AtomicBool,
    disposed: AtomicBool,
}

/// Clears the merge flag when a merge ends, including when it is dropped
struct MergeGuard<'a>(&'a AtomicBool);

impl Drop for MergeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl JobStore {
    /// Creates an empty store for `view`
    ///
    /// The page size comes from the stored preference for `view`, falling
    /// back to `default_page_size`.
    pub fn new(
        view: ViewKey,
        directory: Arc<dyn JobDirectory>,
        errors: Arc<dyn ErrorSink>,
        prefs: Arc<PageSizePrefs>,
        default_page_size: usize,
    ) -> Self {
        let page_size = prefs.get(view, default_page_size);
        Self {
            view,
            directory,
            errors,
            prefs,
            state: Mutex::new(StoreState {
                page: PageDescriptor::new(page_size),
                jobs: Vec::new(),
                selection: BTreeSet::new(),
                loading: false,
                replace_generation: 0,
            }),
            merge_in_flight: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view(&self) -> ViewKey {
        self.view
    }

    pub(crate) fn directory(&self) -> &Arc<dyn JobDirectory> {
        &self.directory
    }

    pub(crate) fn errors(&self) -> &Arc<dyn ErrorSink> {
        &self.errors
    }

    // =============================================================================
    // Refresh
    // =============================================================================

    /// Reloads the current page and replaces the whole row set
    ///
    /// On failure the error is reported, `loading` is cleared and jobs and
    /// total keep their previous values. A replace that completes after a
    /// newer replace was issued is discarded.
    pub async fn replace_fetch(&self) -> FetchOutcome {
        if self.is_disposed() {
            return FetchOutcome::Discarded;
        }

        let (generation, query) = {
            let mut state = self.lock();
            state.replace_generation += 1;
            state.loading = true;
            (state.replace_generation, state.page.query())
        };

        let result = self.directory.list_jobs(&query).await;

        if self.is_disposed() {
            debug!("Discarding replace for disposed {} store", self.view);
            return FetchOutcome::Discarded;
        }

        let mut state = self.lock();
        if state.replace_generation != generation {
            debug!("Discarding superseded replace for {}", self.view);
            return FetchOutcome::Discarded;
        }
        state.loading = false;

        match result {
            Ok(page) => {
                let active = page.items.iter().any(Job::is_active);
                debug!(
                    "Replaced {} rows of {} (total {})",
                    page.items.len(),
                    self.view,
                    page.total_count
                );
                state.jobs = page.items;
                state.page.total = page.total_count;
                state.selection.clear();
                FetchOutcome::Applied { active }
            }
            Err(e) => {
                drop(state);
                self.errors.report("Failed to load jobs", &e);
                FetchOutcome::Failed
            }
        }
    }

    /// Reloads the current page silently and merges it into the rows
    ///
    /// Only one merge per store runs at a time; a call made while another
    /// merge is in flight returns [`FetchOutcome::Skipped`] without
    /// touching the directory.
    pub async fn merge_fetch(&self) -> FetchOutcome {
        if self.is_disposed() {
            return FetchOutcome::Discarded;
        }

        if self.merge_in_flight.swap(true, Ordering::AcqRel) {
            debug!("Merge for {} already in flight, skipping", self.view);
            return FetchOutcome::Skipped;
        }
        let _guard = MergeGuard(&self.merge_in_flight);

        let query = self.lock().page.query();
        let result = self.directory.list_jobs(&query).await;

        if self.is_disposed() {
            debug!("Discarding merge for disposed {} store", self.view);
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(page) => {
                let active = page.items.iter().any(Job::is_active);
                let mut state = self.lock();
                let mut updated = 0;
                for fresh in &page.items {
                    if let Some(job) = state.jobs.iter_mut().find(|job| job.id == fresh.id) {
                        job.absorb(fresh);
                        updated += 1;
                    }
                }
                debug!("Merged {} of {} fetched rows into {}", updated, page.items.len(), self.view);
                FetchOutcome::Applied { active }
            }
            Err(e) => {
                self.errors.report("Failed to refresh jobs", &e);
                FetchOutcome::Failed
            }
        }
    }

    // =============================================================================
    // Page Descriptor
    // =============================================================================

    /// Moves to `page` (1-based) and replaces the rows
    pub async fn set_page(&self, page: usize) -> FetchOutcome {
        self.lock().page.page = page.max(1);
        self.replace_fetch().await
    }

    /// Changes the page size, persists it, and reloads from page 1
    pub async fn set_page_size(&self, page_size: usize) -> FetchOutcome {
        let page_size = page_size.max(1);
        {
            let mut state = self.lock();
            state.page.page_size = page_size;
            state.page.page = 1;
        }
        if let Err(e) = self.prefs.set(self.view, page_size) {
            self.errors.report("Failed to save page size", &e);
        }
        self.replace_fetch().await
    }

    /// Changes the sort order and replaces the rows
    pub async fn set_sort(&self, sort: Option<SortOrder>) -> FetchOutcome {
        self.lock().page.sort = sort;
        self.replace_fetch().await
    }

    /// Changes the filter, goes back to page 1 and replaces the rows
    pub async fn set_filter(&self, filter: Option<JobFilter>) -> FetchOutcome {
        {
            let mut state = self.lock();
            state.page.filter = filter;
            state.page.page = 1;
        }
        self.replace_fetch().await
    }

    // =============================================================================
    // Selection
    // =============================================================================

    /// Selects a materialized job; returns false if `id` is not on the page
    pub fn select(&self, id: JobId) -> bool {
        let mut state = self.lock();
        if state.jobs.iter().any(|job| job.id == id) {
            state.selection.insert(id);
            true
        } else {
            false
        }
    }

    pub fn deselect(&self, id: JobId) {
        self.lock().selection.remove(&id);
    }

    pub fn select_all(&self) {
        let mut state = self.lock();
        let ids: Vec<JobId> = state.jobs.iter().map(|job| job.id).collect();
        state.selection.extend(ids);
    }

    pub fn clear_selection(&self) {
        self.lock().selection.clear();
    }

    /// Selected jobs, in row order
    pub fn selected_jobs(&self) -> Vec<Job> {
        let state = self.lock();
        state
            .jobs
            .iter()
            .filter(|job| state.selection.contains(&job.id))
            .cloned()
            .collect()
    }

    /// Whether the current selection may be stopped
    ///
    /// True iff something is selected and every selected job is still
    /// non-terminal.
    pub fn can_stop(&self) -> bool {
        let selected = self.selected_jobs();
        !selected.is_empty() && selected.iter().all(Job::is_active)
    }

    // =============================================================================
    // Accessors
    // =============================================================================

    pub fn jobs(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    /// Current copy of one materialized job
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.lock().jobs.iter().find(|job| job.id == id).cloned()
    }

    pub fn page(&self) -> PageDescriptor {
        self.lock().page.clone()
    }

    pub fn selection(&self) -> BTreeSet<JobId> {
        self.lock().selection.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    /// Whether any materialized job is non-terminal
    pub fn has_active_jobs(&self) -> bool {
        self.lock().jobs.iter().any(Job::is_active)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            page: state.page.clone(),
            jobs: state.jobs.clone(),
            selection: state.selection.clone(),
            loading: state.loading,
        }
    }

    // =============================================================================
    // Lifecycle
    // =============================================================================

    /// Marks the store as torn down; later responses are discarded
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
