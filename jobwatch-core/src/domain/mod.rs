//! Core domain types
//!
//! The structures a monitor reasons about. They are shared between the
//! HTTP client (which decodes them) and the monitor engine (which
//! materializes, merges and cancels them).

pub mod job;
pub mod page;
