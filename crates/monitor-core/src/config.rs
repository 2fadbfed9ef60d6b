//! Monitor configuration
//!
//! Every field has a default matching the historical command-line defaults,
//! so a partial TOML file only needs to name what it changes.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::party::Party;
use crate::rtp::packet::{MAX_DATAGRAM_SIZE, RTP_HEADER_SIZE};

/// Top-level configuration of one monitor process
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Relay control endpoint
    pub relay: RelayConfig,
    /// Parameters of the synthetic call
    pub call: CallConfig,
    /// Probe packet shape and rate
    pub rtp: RtpConfig,
    /// Rolling history of interval snapshots
    pub history: HistoryConfig,
    /// Status HTTP server
    pub status: StatusConfig,
}

/// Relay control endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host name or address of the relay control socket
    pub host: String,
    /// UDP port of the relay control socket
    pub port: u16,
    /// Upper bound on waiting for each control reply
    pub reply_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 22222,
            reply_timeout_ms: 5000,
        }
    }
}

impl RelayConfig {
    /// Reply timeout as a duration
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Order of the two tags in the Answer (lookup) request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOrder {
    /// `<fromTag>;1 <toTag>;1`
    #[default]
    Natural,
    /// `<toTag>;1 <fromTag>;1`, for relays that key the lookup on the callee tag
    Reversed,
}

/// Parameters advertised to the relay for the synthetic call
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Codec list appended to the `U`/`L` command letters
    pub codecs: String,
    /// Address advertised in the Offer request
    pub offer_address: String,
    /// Port advertised in the Offer request
    pub offer_port: u16,
    /// Address advertised in the Answer request
    pub answer_address: String,
    /// Port advertised in the Answer request
    pub answer_port: u16,
    /// Tag order of the Answer request
    pub tag_order: TagOrder,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            codecs: "c0,8,18,101".to_string(),
            offer_address: "192.168.1.100".to_string(),
            offer_port: 10560,
            answer_address: "192.168.2.200".to_string(),
            answer_port: 20560,
            tag_order: TagOrder::Natural,
        }
    }
}

/// Probe packet shape and rate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RtpConfig {
    /// Synthetic payload bytes after the 12-byte header
    pub payload_size: usize,
    /// Payload type tag written to byte 1
    pub payload_type: u8,
    /// Interval between two probes of one party
    pub ptime_ms: u64,
}

impl Default for RtpConfig {
    fn default() -> Self {
        Self {
            payload_size: 160,
            payload_type: 8,
            ptime_ms: 20,
        }
    }
}

impl RtpConfig {
    /// Send interval as a duration
    pub fn ptime(&self) -> Duration {
        Duration::from_millis(self.ptime_ms)
    }
}

/// Rolling history of interval snapshots
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of closed intervals kept
    pub capacity: usize,
    /// Snapshots evicted at once when the window is full
    pub step: usize,
    /// Interval length in seconds
    pub interval_secs: u64,
    /// Party whose received probes feed the window
    pub primary_party: Party,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            step: 1,
            interval_secs: 60,
            primary_party: Party::A,
        }
    }
}

/// Status HTTP server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// TCP port the status server listens on (all interfaces)
    pub listen_port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { listen_port: 8080 }
    }
}

impl MonitorConfig {
    /// Check the configuration before any socket is opened
    pub fn validate(&self) -> Result<()> {
        if self.relay.host.trim().is_empty() {
            return Err(Error::Config("relay host must not be empty".into()));
        }
        if self.relay.reply_timeout_ms == 0 {
            return Err(Error::Config("relay reply timeout must be at least 1 ms".into()));
        }
        if self.call.codecs.is_empty() || self.call.codecs.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "codec list must be a single non-empty token, got {:?}",
                self.call.codecs
            )));
        }
        for (name, value) in [
            ("offer address", &self.call.offer_address),
            ("answer address", &self.call.answer_address),
        ] {
            if value.is_empty() || value.contains(char::is_whitespace) {
                return Err(Error::Config(format!("{} must be a single token, got {:?}", name, value)));
            }
        }
        if self.rtp.payload_type > 127 {
            return Err(Error::Config(format!(
                "payload type {} does not fit in 7 bits",
                self.rtp.payload_type
            )));
        }
        if RTP_HEADER_SIZE + self.rtp.payload_size > MAX_DATAGRAM_SIZE {
            return Err(Error::Config(format!(
                "payload size {} exceeds the {} byte datagram limit",
                self.rtp.payload_size,
                MAX_DATAGRAM_SIZE - RTP_HEADER_SIZE
            )));
        }
        if self.rtp.ptime_ms == 0 {
            return Err(Error::Config("packet time must be at least 1 ms".into()));
        }
        if self.history.capacity == 0 {
            return Err(Error::Config("history capacity must be at least 1".into()));
        }
        if self.history.step == 0 || self.history.step > self.history.capacity {
            return Err(Error::Config(format!(
                "history step must be between 1 and {}, got {}",
                self.history.capacity, self.history.step
            )));
        }
        if self.history.interval_secs == 0 {
            return Err(Error::Config("history interval must be at least 1 second".into()));
        }
        Ok(())
    }
}
