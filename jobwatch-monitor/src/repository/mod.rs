//! Repository layer
//!
//! Repositories abstract communication with a job directory. They provide
//! the two operations a monitor consumes (list a page, stop a job) without
//! any business logic.
//!
//! The directory is trait-based so that the engine can be driven by an
//! in-memory directory in tests.

mod directory;

pub use directory::{HttpJobDirectory, JobDirectory};
