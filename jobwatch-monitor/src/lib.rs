//! Jobwatch Monitor
//!
//! Live-updating, paginated views over a registry's background job
//! directories.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repository: The job directory a view reads from and stops jobs through
//! - Services: Error reporting, operation history, page size preferences
//! - Store: Per-view page state with replace and merge refreshes
//! - Scheduler: Polls the store while any of its jobs is still running
//! - Gate: Confirmation requests between views and a dialog host
//! - Cancel: Concurrent stop requests for a batch of jobs
//! - Monitor: Wires all of the above into one view

pub mod cancel;
pub mod config;
pub mod error;
pub mod gate;
pub mod monitor;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{MonitorError, Result};
pub use monitor::{JobMonitor, MonitorServices, MonitorSettings, StopRequestOutcome};
