//! Common infrastructure for the RTPproxy call monitor
//!
//! Logging setup and tracked task spawning shared by the monitor core,
//! the status console and the command-line binary.

pub mod errors;
pub mod logging;
pub mod tasks;

pub use errors::{Error, Result};
pub use logging::{setup_logging, LogTarget, LoggingConfig, LoggingGuard};
pub use tasks::{ShutdownReport, TaskManager};

/// Re-export of the cancellation primitive used across the workspace
pub use tokio_util::sync::CancellationToken;
