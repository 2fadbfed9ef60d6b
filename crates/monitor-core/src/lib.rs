//! Synthetic call monitor for RTPproxy
//!
//! The monitor places a fake two-party call through the relay's control
//! protocol, streams probes in both directions through the allocated relay
//! ports and measures, per fixed interval, how many probes of the monitored
//! direction arrived, how many sequence numbers were skipped and the summed
//! relay latency. Closed intervals are kept in a bounded history window.
//!
//! ```no_run
//! use rtpmon_core::prelude::*;
//!
//! # async fn run() -> rtpmon_core::Result<()> {
//! let config = MonitorConfig::default();
//! let window = HistoryWindow::new(config.history.capacity, config.history.step)?;
//! let reader = window.reader();
//!
//! let monitor = CallMonitor::start(config, window).await?;
//! let shutdown = CancellationToken::new();
//! // hand `reader` to a status server, cancel `shutdown` on a signal
//! monitor.run_until(shutdown).await?;
//! # let _ = reader;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod monitor;
pub mod party;
pub mod rtp;
pub mod stats;

pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use monitor::{CallMonitor, RunningMonitor};
pub use party::Party;
pub use stats::{HistoryWindow, IntervalStats, WindowReader};

/// Commonly used types
pub mod prelude {
    pub use crate::config::{MonitorConfig, TagOrder};
    pub use crate::error::{Error, Result};
    pub use crate::monitor::{CallMonitor, RunningMonitor};
    pub use crate::party::Party;
    pub use crate::stats::{HistoryWindow, IntervalStats, WindowReader};
    pub use rtpmon_infra_common::CancellationToken;
}
