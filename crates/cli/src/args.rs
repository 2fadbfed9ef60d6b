//! Command-line arguments and configuration loading

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rtpmon_core::config::TagOrder;
use rtpmon_core::{MonitorConfig, Party};
use rtpmon_infra_common::{logging::parse_log_level, LogTarget, LoggingConfig};

/// Name used in the welcome line, error output and log file name
pub const APP_NAME: &str = "rtpproxy-monitor";

/// Synthetic call monitor for RTPproxy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// RTPproxy control host
    #[arg(long)]
    pub rhost: Option<String>,

    /// RTPproxy control port
    #[arg(long)]
    pub rport: Option<u16>,

    /// Port of the HTTP status page
    #[arg(long)]
    pub hport: Option<u16>,

    /// Number of intervals kept in the history
    #[arg(long)]
    pub hsize: Option<usize>,

    /// Interval length in seconds
    #[arg(long)]
    pub htime: Option<u64>,

    /// Probe payload size in bytes
    #[arg(long)]
    pub psize: Option<usize>,

    /// Probe payload type
    #[arg(long)]
    pub ptype: Option<u8>,

    /// Swap the tags in the Answer request
    #[arg(long)]
    pub revtags: bool,

    /// Party whose received probes are measured (a or b)
    #[arg(long)]
    pub primary: Option<Party>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Write JSON log lines to stdout
    #[arg(long, conflicts_with = "log_dir")]
    pub log_json: bool,

    /// Write logs to rtpproxy-monitor.log in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Build the monitor configuration: defaults, then the file, then flags
    pub fn monitor_config(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
            }
            None => MonitorConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(host) = &self.rhost {
            config.relay.host = host.clone();
        }
        if let Some(port) = self.rport {
            config.relay.port = port;
        }
        if let Some(port) = self.hport {
            config.status.listen_port = port;
        }
        if let Some(capacity) = self.hsize {
            config.history.capacity = capacity;
        }
        if let Some(secs) = self.htime {
            config.history.interval_secs = secs;
        }
        if let Some(size) = self.psize {
            config.rtp.payload_size = size;
        }
        if let Some(payload_type) = self.ptype {
            config.rtp.payload_type = payload_type;
        }
        if self.revtags {
            config.call.tag_order = TagOrder::Reversed;
        }
        if let Some(party) = self.primary {
            config.history.primary_party = party;
        }
    }

    /// Logging setup from the log flags
    pub fn logging_config(&self) -> anyhow::Result<LoggingConfig> {
        let level = parse_log_level(&self.log_level)?;
        let target = match (&self.log_dir, self.log_json) {
            (Some(directory), _) => LogTarget::File {
                directory: directory.clone(),
                prefix: APP_NAME.to_string(),
            },
            (None, true) => LogTarget::Json,
            (None, false) => LogTarget::Stderr,
        };
        Ok(LoggingConfig::new(level).with_target(target))
    }
}

/// Listen address of the status page
pub fn status_addr(config: &MonitorConfig) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.status.listen_port))
}
