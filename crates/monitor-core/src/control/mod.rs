//! Relay control plane
//!
//! The relay is driven by a compact text protocol over UDP: one request
//! datagram, one reply datagram. A monitor places exactly one call:
//! Offer (allocates party B), Answer (allocates party A), and Delete on
//! shutdown.

mod channel;
mod command;
mod negotiator;
mod session;

pub use channel::ControlChannel;
pub use command::{AllocationReply, ControlCommand};
pub use negotiator::{NegotiationState, Negotiator};
pub use session::{random_token, CallSession, CALL_ID_LEN, COOKIE_LEN, TAG_LEN};
