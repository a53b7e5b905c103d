//! Service layer
//!
//! Services are the collaborators a monitor reports to and reads from:
//! where errors go, where operation progress is recorded, and where the
//! page-size preference is kept.
//!
//! All services are trait-based or self-contained so that front ends can
//! plug in their own presentation.

mod error_sink;
mod operations;
mod preferences;

// Re-export traits
pub use error_sink::ErrorSink;
pub use operations::OperationLog;

// Re-export implementations
pub use error_sink::{BufferedErrorSink, TracingErrorSink};
pub use operations::{
    DEFAULT_OPERATION_CAPACITY, InMemoryOperationLog, OperationRecord, OperationState,
};
pub use preferences::{PageSizePrefs, ViewKey};
