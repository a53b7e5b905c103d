//! Pagination domain types
//!
//! A monitor always looks at one page of a directory at a time. The
//! descriptor records which page, how it is filtered and sorted, and how
//! many jobs the directory reported in total.

use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Page size used when no preference has been stored
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Fuzzy filter on one job attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    pub key: String,
    pub value: String,
}

impl JobFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Renders the filter in the registry's query syntax (`key=~value`)
    pub fn to_query(&self) -> String {
        format!("{}=~{}", self.key, self.value)
    }
}

/// Sort order on one job attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub descending: bool,
}

impl SortOrder {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Renders the order in the registry's sort syntax (`-field` when descending)
    pub fn to_query(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

/// Pagination state of one monitored view
///
/// `page` and `total` only move on a replace refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub filter: Option<JobFilter>,
    pub sort: Option<SortOrder>,
}

impl PageDescriptor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
            filter: None,
            sort: None,
        }
    }

    /// The listing request describing this page
    pub fn query(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            page_size: self.page_size,
            filter: self.filter.clone(),
            sort: self.sort.clone(),
        }
    }

    /// Number of pages needed to show `total` jobs (at least one)
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size).max(1)
    }
}

impl Default for PageDescriptor {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Criteria of one listing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    pub filter: Option<JobFilter>,
    pub sort: Option<SortOrder>,
}

impl ListQuery {
    /// Query-string pairs understood by the registry API
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(filter) = &self.filter {
            params.push(("q", filter.to_query()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.to_query()));
        }
        params
    }
}

/// One page of jobs as returned by a directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPage {
    pub items: Vec<Job>,
    /// Total number of jobs matching the query, across all pages
    pub total_count: usize,
}
