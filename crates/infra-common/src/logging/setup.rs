use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{Error, Result};

/// Where log lines are written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LogTarget {
    /// Human readable lines on stderr
    Stderr,
    /// JSON lines on stdout, for log shippers
    Json,
    /// Plain lines appended to `<directory>/<prefix>.log`
    File {
        /// Directory that holds the log file
        directory: PathBuf,
        /// File name without the `.log` extension
        prefix: String,
    },
}

impl Default for LogTarget {
    fn default() -> Self {
        LogTarget::Stderr
    }
}

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use when `RUST_LOG` does not say otherwise
    pub level: Level,
    /// Destination of the log output
    pub target: LogTarget,
    /// Whether to include file and line information
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            target: LogTarget::Stderr,
            file_info: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Select the log destination
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }
}

/// Keeps the background writer of a file target alive.
///
/// Dropping the guard flushes and stops the writer, so hold it until the
/// process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Set up the logging system with the provided configuration
pub fn setup_logging(config: LoggingConfig) -> Result<LoggingGuard> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let mut worker = None;
    let installed = match &config.target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::Json => builder.with_writer(std::io::stdout).json().try_init(),
        LogTarget::File { directory, prefix } => {
            std::fs::create_dir_all(directory).map_err(|e| {
                Error::Logging(format!("Cannot create log directory {}: {}", directory.display(), e))
            })?;
            let appender = tracing_appender::rolling::never(directory, format!("{}.log", prefix));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            worker = Some(guard);
            builder.with_writer(writer).with_ansi(false).try_init()
        }
    };

    installed.map_err(|e| Error::Logging(e.to_string()))?;
    Ok(LoggingGuard { _worker: worker })
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}
