//! Send and receive loops of the simulated parties

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::packet::{ProbeHeader, ProbeTemplate, MAX_DATAGRAM_SIZE};
use crate::clock;
use crate::error::{Error, Result};
use crate::party::Party;
use crate::stats::DeliveryEvent;

/// Send one probe every `ptime` until the task is cancelled.
///
/// The sequence number starts at 0 and wraps. Send failures are logged and
/// the loop moves on to the next tick.
pub async fn run_sender(party: Party, socket: Arc<UdpSocket>, template: ProbeTemplate, ptime: Duration) {
    let mut ticker = tokio::time::interval(ptime);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence: u16 = 0;

    debug!(party = %party, ssrc = template.ssrc(), ?ptime, "sender started");
    loop {
        ticker.tick().await;

        let packet = template.packet(sequence, clock::media_timestamp());
        if let Err(e) = socket.send(&packet).await {
            warn!(party = %party, sequence, error = %e, "failed to send probe");
        }
        sequence = sequence.wrapping_add(1);
    }
}

/// Check a received datagram against the peer's SSRC and turn it into a delivery event.
///
/// `now` is the media timestamp at receive time.
pub fn decode_delivery(datagram: &[u8], expected_ssrc: u32, now: u32) -> Result<DeliveryEvent> {
    let header = ProbeHeader::decode(datagram)?;
    if header.ssrc != expected_ssrc {
        return Err(Error::Validation {
            expected: expected_ssrc,
            actual: header.ssrc,
        });
    }
    Ok(DeliveryEvent {
        sequence: header.sequence,
        delay: clock::elapsed_units(now, header.timestamp),
    })
}

/// Read probes from the peer and forward delivery events.
///
/// Datagrams that fail validation are logged and dropped. Returns when the
/// event channel is closed.
pub async fn run_receiver(
    party: Party,
    socket: Arc<UdpSocket>,
    peer_ssrc: u32,
    events: mpsc::Sender<DeliveryEvent>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    debug!(party = %party, peer_ssrc, "receiver started");
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                warn!(party = %party, error = %e, "failed to receive probe");
                continue;
            }
        };

        let event = match decode_delivery(&buf[..len], peer_ssrc, clock::media_timestamp()) {
            Ok(event) => event,
            Err(e) => {
                warn!(party = %party, error = %e, "dropping datagram");
                continue;
            }
        };

        trace!(party = %party, sequence = event.sequence, delay = event.delay, "probe received");
        if events.send(event).await.is_err() {
            debug!(party = %party, "event channel closed, receiver stopping");
            break;
        }
    }
}
