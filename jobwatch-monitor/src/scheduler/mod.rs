//! Scheduler layer for the monitor
//!
//! This layer drives the background refresh of a store: it decides when
//! polling starts and stops, and owns the timer while it runs.

pub mod refresher;

pub use refresher::{POLL_INTERVAL, Refresher, RefresherPhase};
