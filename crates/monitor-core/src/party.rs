//! The two simulated endpoints of the monitored call

use std::fmt;

use serde::Deserialize;

/// One side of the synthetic call.
///
/// Party A's transport comes from the Answer exchange, party B's from the
/// Offer exchange. Each party sends its own probes and receives the other
/// party's probes through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// Answering side (Alice)
    A,
    /// Offering side (Bob)
    B,
}

impl Party {
    /// The party at the other end of the call
    pub fn peer(self) -> Party {
        match self {
            Party::A => Party::B,
            Party::B => Party::A,
        }
    }

    /// Synthetic payload byte at offset `index`.
    ///
    /// Party A ramps up and party B ramps down, so a payload identifies its
    /// sender at a glance in a capture.
    pub fn payload_byte(self, index: usize) -> u8 {
        let step = (index % 255) as u8;
        match self {
            Party::A => step,
            Party::B => 255 - step,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::A => write!(f, "A"),
            Party::B => write!(f, "B"),
        }
    }
}

impl std::str::FromStr for Party {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" | "alice" => Ok(Party::A),
            "b" | "bob" => Ok(Party::B),
            other => Err(format!("unknown party '{}', expected a or b", other)),
        }
    }
}
