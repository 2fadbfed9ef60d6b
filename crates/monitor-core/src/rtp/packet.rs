//! Probe packet layout
//!
//! ```text
//!  0               1               2               3
//! +---------------+---------------+-------------------------------+
//! |  marker 0x80  | payload type  |        sequence number        |
//! +---------------+---------------+-------------------------------+
//! |                     timestamp (media units)                   |
//! +---------------------------------------------------------------+
//! |                             SSRC                              |
//! +---------------------------------------------------------------+
//! |                     payload ramp ...                          |
//! ```
//!
//! All multi-byte fields are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::Rng;

use crate::error::{Error, Result};
use crate::party::Party;

/// Size of the fixed probe header
pub const RTP_HEADER_SIZE: usize = 12;

/// First header byte: version 2, no padding, extension or CSRC
pub const RTP_MARKER: u8 = 0x80;

/// Largest datagram the monitor sends or reads (one Ethernet MTU)
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Decoded fixed header of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeHeader {
    /// Payload type tag
    pub payload_type: u8,
    /// Sender's sequence number
    pub sequence: u16,
    /// Media timestamp at send time
    pub timestamp: u32,
    /// Sender's session identifier
    pub ssrc: u32,
}

impl ProbeHeader {
    /// Write the header to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(RTP_MARKER);
        buf.put_u8(self.payload_type);
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
    }

    /// Read the header from the front of a datagram.
    ///
    /// Only the length is checked; the marker byte is not interpreted.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        if datagram.len() < RTP_HEADER_SIZE {
            return Err(Error::MalformedPacket(format!(
                "datagram of {} bytes is shorter than the {}-byte header",
                datagram.len(),
                RTP_HEADER_SIZE
            )));
        }

        let mut cursor = datagram;
        let _marker = cursor.get_u8();
        Ok(Self {
            payload_type: cursor.get_u8(),
            sequence: cursor.get_u16(),
            timestamp: cursor.get_u32(),
            ssrc: cursor.get_u32(),
        })
    }
}

/// Builds the probes of one party: fixed payload type, SSRC and payload,
/// varying sequence number and timestamp
#[derive(Debug, Clone)]
pub struct ProbeTemplate {
    payload_type: u8,
    ssrc: u32,
    payload: Bytes,
}

impl ProbeTemplate {
    /// Template for `party` with a `payload_size`-byte ramp
    pub fn new(party: Party, payload_type: u8, ssrc: u32, payload_size: usize) -> Self {
        let payload: Vec<u8> = (0..payload_size).map(|i| party.payload_byte(i)).collect();
        Self {
            payload_type,
            ssrc,
            payload: Bytes::from(payload),
        }
    }

    /// SSRC stamped on every probe
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Total datagram size
    pub fn packet_len(&self) -> usize {
        RTP_HEADER_SIZE + self.payload.len()
    }

    /// Encode the probe carrying `sequence` and `timestamp`
    pub fn packet(&self, sequence: u16, timestamp: u32) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.packet_len());
        ProbeHeader {
            payload_type: self.payload_type,
            sequence,
            timestamp,
            ssrc: self.ssrc,
        }
        .encode(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// Two distinct, non-zero 31-bit SSRCs for parties A and B
pub fn generate_ssrc_pair() -> (u32, u32) {
    let mut rng = rand::thread_rng();
    let a = rng.gen_range(1..=0x7fff_ffffu32);
    loop {
        let b = rng.gen_range(1..=0x7fff_ffffu32);
        if b != a {
            return (a, b);
        }
    }
}
