//! Error types for the call monitor

use std::time::Duration;

use thiserror::Error;

/// Error type for monitor operations
#[derive(Error, Debug)]
pub enum Error {
    /// A socket could not be resolved, bound or connected
    #[error("Connectivity error for {endpoint}: {source}")]
    Connectivity {
        /// Remote endpoint the socket was meant for
        endpoint: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The relay replied with something that is not a valid allocation
    #[error("Protocol error: {reason} (reply: {reply:?})")]
    Protocol {
        /// What was wrong with the reply
        reason: String,
        /// Raw reply as received
        reply: String,
    },

    /// The relay did not answer a control request in time
    #[error("Timed out after {after:?} waiting for {operation}")]
    Timeout {
        /// Control operation that was waiting
        operation: String,
        /// Configured wait bound
        after: Duration,
    },

    /// Send or receive failure on an established socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A probe packet carried an unexpected session identifier
    #[error("SSRC mismatch: expected {expected}, got {actual}")]
    Validation {
        /// SSRC of the party that should be sending to this socket
        expected: u32,
        /// SSRC found in the datagram
        actual: u32,
    },

    /// A datagram too short to hold a probe header
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    /// An operation was called in the wrong negotiation state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration rejected by validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task could not be started
    #[error("Task error: {0}")]
    Task(#[from] rtpmon_infra_common::Error),
}

impl Error {
    /// Create a protocol error carrying the raw reply
    pub fn protocol(reason: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
            reply: reply.into(),
        }
    }

    /// Create a connectivity error for `endpoint`
    pub fn connectivity(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connectivity {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Whether the error must abort the process.
    ///
    /// Negotiation and configuration failures are fatal; failures inside the
    /// probe loops are logged and the loop moves on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Connectivity { .. }
                | Error::Protocol { .. }
                | Error::Timeout { .. }
                | Error::InvalidState(_)
                | Error::Config(_)
                | Error::Task(_)
        )
    }
}

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, Error>;
