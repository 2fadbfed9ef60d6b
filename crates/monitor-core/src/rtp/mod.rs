//! Synthetic RTP probes
//!
//! Each party runs a sender stamping probes at a fixed packet time and a
//! receiver validating the peer's probes and emitting delivery events.

pub mod engine;
pub mod packet;

pub use engine::{decode_delivery, run_receiver, run_sender};
pub use packet::{
    generate_ssrc_pair, ProbeHeader, ProbeTemplate, MAX_DATAGRAM_SIZE, RTP_HEADER_SIZE, RTP_MARKER,
};
