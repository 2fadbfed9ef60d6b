//! Error types for infrastructure components

use thiserror::Error;

/// Infrastructure error
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// The logging backend could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Task spawning or shutdown failed
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;
