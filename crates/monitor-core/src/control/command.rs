//! Relay control commands and reply parsing

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::{Error, Result};

/// Minimum number of tokens in an allocation reply: cookie, port, address
const ALLOCATION_REPLY_TOKENS: usize = 3;

/// One request on the relay control channel.
///
/// Requests are single datagrams of space-separated tokens:
///
/// ```text
/// Offer   <cookie> U<codecs> <callId> <addr> <port> <fromTag>;1
/// Answer  <cookie> L<codecs> <callId> <addr> <port> <tag1>;1 <tag2>;1
/// Delete  <cookie> D <callId> <fromTag> <toTag>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Create the session (`U` command)
    Offer {
        cookie: String,
        codecs: String,
        call_id: String,
        address: String,
        port: u16,
        from_tag: String,
    },
    /// Complete the session (`L` command); tags already in wire order
    Answer {
        cookie: String,
        codecs: String,
        call_id: String,
        address: String,
        port: u16,
        tags: [String; 2],
    },
    /// Tear the session down (`D` command)
    Delete {
        cookie: String,
        call_id: String,
        from_tag: String,
        to_tag: String,
    },
}

impl ControlCommand {
    /// Cookie the relay echoes back in its reply
    pub fn cookie(&self) -> &str {
        match self {
            ControlCommand::Offer { cookie, .. }
            | ControlCommand::Answer { cookie, .. }
            | ControlCommand::Delete { cookie, .. } => cookie,
        }
    }

    /// Short name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ControlCommand::Offer { .. } => "offer",
            ControlCommand::Answer { .. } => "answer",
            ControlCommand::Delete { .. } => "delete",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Offer { cookie, codecs, call_id, address, port, from_tag } => {
                write!(f, "{} U{} {} {} {} {};1", cookie, codecs, call_id, address, port, from_tag)
            }
            ControlCommand::Answer { cookie, codecs, call_id, address, port, tags } => write!(
                f,
                "{} L{} {} {} {} {};1 {};1",
                cookie, codecs, call_id, address, port, tags[0], tags[1]
            ),
            ControlCommand::Delete { cookie, call_id, from_tag, to_tag } => {
                write!(f, "{} D {} {} {}", cookie, call_id, from_tag, to_tag)
            }
        }
    }
}

/// Relay reply to an Offer or Answer: `<cookie> <port> <addr> ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationReply {
    /// Cookie echoed by the relay
    pub cookie: String,
    /// Relay-allocated media port
    pub port: u16,
    /// Relay-allocated media address
    pub address: IpAddr,
}

impl AllocationReply {
    /// Parse a reply, checking it answers the request carrying `expected_cookie`.
    ///
    /// Trailing tokens after the address are ignored. Anything else that does
    /// not have the expected shape is a [`Error::Protocol`] carrying the raw
    /// reply.
    pub fn parse(raw: &str, expected_cookie: &str) -> Result<Self> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();

        let Some(&cookie) = tokens.first() else {
            return Err(Error::protocol("empty reply", raw));
        };
        if cookie != expected_cookie {
            return Err(Error::protocol(
                format!("reply cookie {:?} does not match request cookie {:?}", cookie, expected_cookie),
                raw,
            ));
        }
        if let Some(code) = tokens.get(1).filter(|t| t.starts_with('E')) {
            return Err(Error::protocol(format!("relay returned error {}", code), raw));
        }
        if tokens.len() < ALLOCATION_REPLY_TOKENS {
            return Err(Error::protocol(
                format!(
                    "expected at least {} tokens, got {}",
                    ALLOCATION_REPLY_TOKENS,
                    tokens.len()
                ),
                raw,
            ));
        }

        let port = match tokens[1].parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => return Err(Error::protocol(format!("invalid port {:?}", tokens[1]), raw)),
        };
        let address = tokens[2]
            .parse::<IpAddr>()
            .map_err(|_| Error::protocol(format!("invalid address {:?}", tokens[2]), raw))?;

        Ok(Self {
            cookie: cookie.to_string(),
            port,
            address,
        })
    }

    /// Transport endpoint allocated by the relay
    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}
