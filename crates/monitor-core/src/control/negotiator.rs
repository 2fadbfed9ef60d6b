//! Offer, answer and delete exchange for one call

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{info, warn};

use super::channel::{connect_udp, ControlChannel};
use super::command::AllocationReply;
use super::session::CallSession;
use crate::config::CallConfig;
use crate::error::{Error, Result};
use crate::party::Party;

/// Lifecycle of the synthetic call on the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Nothing sent yet
    Idle,
    /// Offer sent, waiting for party B's allocation
    OfferSent,
    /// Party B's transport is open
    Answered,
    /// Both transports are open; probes may flow
    Active,
    /// Delete sent
    Deleting,
    /// Session torn down and sockets released
    Closed,
    /// A negotiation step failed; the session is unusable
    Failed,
}

/// Drives the Offer / Answer / Delete exchanges and owns the party transports
#[derive(Debug)]
pub struct Negotiator {
    control: ControlChannel,
    session: CallSession,
    call: CallConfig,
    state: NegotiationState,
    party_a: Option<Arc<UdpSocket>>,
    party_b: Option<Arc<UdpSocket>>,
}

impl Negotiator {
    /// Create a negotiator for `session` over an open control channel
    pub fn new(control: ControlChannel, session: CallSession, call: CallConfig) -> Self {
        Self {
            control,
            session,
            call,
            state: NegotiationState::Idle,
            party_a: None,
            party_b: None,
        }
    }

    /// Current state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Identifiers of the call
    pub fn session(&self) -> &CallSession {
        &self.session
    }

    /// Connected transport socket of `party`, once allocated
    pub fn transport(&self, party: Party) -> Option<&Arc<UdpSocket>> {
        match party {
            Party::A => self.party_a.as_ref(),
            Party::B => self.party_b.as_ref(),
        }
    }

    fn expect_state(&self, expected: NegotiationState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "{} requires state {:?}, negotiator is {:?}",
                operation, expected, self.state
            )));
        }
        Ok(())
    }

    /// Send the Offer and open party B's transport.
    ///
    /// `Idle → OfferSent → Answered`. Returns the relay endpoint of party B.
    pub async fn offer(&mut self) -> Result<SocketAddr> {
        self.expect_state(NegotiationState::Idle, "offer")?;

        let command = self.session.offer(&self.call);
        self.state = NegotiationState::OfferSent;

        let endpoint = match self.allocate(Party::B, &command).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.state = NegotiationState::Failed;
                return Err(e);
            }
        };

        self.state = NegotiationState::Answered;
        Ok(endpoint)
    }

    /// Send the Answer and open party A's transport.
    ///
    /// `Answered → Active`. On failure a best-effort Delete is sent so the
    /// half-created session does not linger on the relay.
    pub async fn answer(&mut self) -> Result<SocketAddr> {
        self.expect_state(NegotiationState::Answered, "answer")?;

        let command = self.session.answer(&self.call);
        match self.allocate(Party::A, &command).await {
            Ok(endpoint) => {
                self.state = NegotiationState::Active;
                Ok(endpoint)
            }
            Err(e) => {
                warn!(error = %e, "answer failed, removing half-open session");
                if let Err(delete_err) = self.control.exchange(&self.session.delete()).await {
                    warn!(error = %delete_err, "cleanup delete failed");
                }
                self.party_b = None;
                self.state = NegotiationState::Failed;
                Err(e)
            }
        }
    }

    /// Run the Offer and Answer steps back to back
    pub async fn negotiate(&mut self) -> Result<()> {
        let endpoint_b = self.offer().await?;
        let endpoint_a = self.answer().await?;
        info!(
            call_id = %self.session.call_id,
            party_a = %endpoint_a,
            party_b = %endpoint_b,
            "call established through relay"
        );
        Ok(())
    }

    async fn allocate(&mut self, party: Party, command: &super::ControlCommand) -> Result<SocketAddr> {
        let raw = self.control.exchange(command).await?;
        let reply = AllocationReply::parse(&raw, command.cookie())?;
        let endpoint = reply.endpoint();

        let socket = connect_udp(endpoint).await?;
        info!(party = %party, remote = %endpoint, "transport connected");

        let socket = Some(Arc::new(socket));
        match party {
            Party::A => self.party_a = socket,
            Party::B => self.party_b = socket,
        }
        Ok(endpoint)
    }

    /// Tear the session down and release both transports.
    ///
    /// `Active → Deleting → Closed`. The relay's reply is read and discarded;
    /// a missing reply is logged but does not fail the teardown. Sockets are
    /// released on every path.
    pub async fn delete(&mut self) -> Result<()> {
        self.expect_state(NegotiationState::Active, "delete")?;

        self.state = NegotiationState::Deleting;
        self.party_a = None;
        self.party_b = None;
        let result = match self.control.exchange(&self.session.delete()).await {
            Ok(_) => Ok(()),
            Err(e @ Error::Timeout { .. }) => {
                warn!(error = %e, "no reply to delete");
                Ok(())
            }
            Err(e) => Err(e),
        };

        self.state = NegotiationState::Closed;
        info!(call_id = %self.session.call_id, "call deleted");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Scripted relay answering each request with the next canned reply.
    /// `{cookie}` in a reply is replaced by the request's cookie and
    /// `{port}` by a live loopback port. An empty reply reads the request
    /// without answering it. Returns the relay address and a
    /// handle yielding the requests it saw.
    async fn scripted_relay(
        replies: Vec<&'static str>,
    ) -> (SocketAddr, tokio::task::JoinHandle<Vec<String>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let media = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let media_port = media.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let _media = media;
            let mut seen = Vec::new();
            let mut buf = [0u8; 1500];
            for reply in replies {
                let (len, from) = socket.recv_from(&mut buf).await.unwrap();
                let request = String::from_utf8_lossy(&buf[..len]).to_string();
                let cookie = request.split(' ').next().unwrap().to_string();
                seen.push(request);
                if reply.is_empty() {
                    continue;
                }
                let reply = reply
                    .replace("{cookie}", &cookie)
                    .replace("{port}", &media_port.to_string());
                socket.send_to(reply.as_bytes(), from).await.unwrap();
            }
            seen
        });

        (addr, handle)
    }

    async fn negotiator_for(relay: SocketAddr, timeout: Duration) -> Negotiator {
        let control = ControlChannel::connect("127.0.0.1", relay.port(), timeout)
            .await
            .unwrap();
        Negotiator::new(control, CallSession::generate(), CallConfig::default())
    }

    #[tokio::test]
    async fn test_full_negotiation_round_trip() {
        let (relay, requests) = scripted_relay(vec![
            "{cookie} {port} 127.0.0.1\n",
            "{cookie} {port} 127.0.0.1\n",
            "{cookie} 0\n",
        ])
        .await;
        let mut negotiator = negotiator_for(relay, Duration::from_secs(2)).await;
        assert_eq!(negotiator.state(), NegotiationState::Idle);

        let endpoint_b = negotiator.offer().await.unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Answered);
        assert_eq!(endpoint_b.ip().to_string(), "127.0.0.1");
        let socket_b = negotiator.transport(Party::B).unwrap();
        assert_eq!(socket_b.peer_addr().unwrap(), endpoint_b);
        assert!(negotiator.transport(Party::A).is_none());

        negotiator.answer().await.unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Active);
        assert!(negotiator.transport(Party::A).is_some());

        negotiator.delete().await.unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Closed);
        assert!(negotiator.transport(Party::A).is_none());
        assert!(negotiator.transport(Party::B).is_none());

        let requests = requests.await.unwrap();
        let session = negotiator.session();
        assert!(requests[0].starts_with(&format!("{} U", session.cookie_offer)));
        assert!(requests[1].starts_with(&format!("{} L", session.cookie_answer)));
        assert_eq!(
            requests[2],
            format!(
                "{} D {} {} {}",
                session.cookie_delete, session.call_id, session.from_tag, session.to_tag
            )
        );
    }

    #[tokio::test]
    async fn test_unanswered_delete_still_closes() {
        let (relay, requests) = scripted_relay(vec![
            "{cookie} {port} 127.0.0.1",
            "{cookie} {port} 127.0.0.1",
            "",
        ])
        .await;
        let mut negotiator = negotiator_for(relay, Duration::from_millis(200)).await;

        negotiator.negotiate().await.unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Active);

        negotiator.delete().await.unwrap();
        assert_eq!(negotiator.state(), NegotiationState::Closed);
        assert!(negotiator.transport(Party::A).is_none());
        assert!(negotiator.transport(Party::B).is_none());

        let requests = requests.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].contains(" D "));
    }

    #[tokio::test]
    async fn test_short_offer_reply_leaves_no_transport() {
        let (relay, _requests) = scripted_relay(vec!["{cookie} 30000\n"]).await;
        let mut negotiator = negotiator_for(relay, Duration::from_secs(2)).await;

        let err = negotiator.offer().await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }), "unexpected error {:?}", err);
        assert_eq!(negotiator.state(), NegotiationState::Failed);
        assert!(negotiator.transport(Party::B).is_none());
        assert!(negotiator.transport(Party::A).is_none());

        // a failed negotiator cannot continue
        assert!(matches!(negotiator.answer().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_failed_answer_sends_cleanup_delete() {
        let (relay, requests) = scripted_relay(vec![
            "{cookie} {port} 127.0.0.1",
            "{cookie} E7",
            "{cookie} 0",
        ])
        .await;
        let mut negotiator = negotiator_for(relay, Duration::from_secs(2)).await;

        negotiator.offer().await.unwrap();
        let err = negotiator.answer().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(negotiator.state(), NegotiationState::Failed);
        assert!(negotiator.transport(Party::B).is_none());

        let requests = requests.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].contains(" D "));
    }

    #[tokio::test]
    async fn test_silent_relay_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = silent.local_addr().unwrap();
        let mut negotiator = negotiator_for(relay, Duration::from_millis(100)).await;

        let err = negotiator.offer().await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }), "unexpected error {:?}", err);
        assert_eq!(negotiator.state(), NegotiationState::Failed);
    }

    #[tokio::test]
    async fn test_operations_out_of_order_are_rejected() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let relay = silent.local_addr().unwrap();
        let mut negotiator = negotiator_for(relay, Duration::from_millis(100)).await;

        assert!(matches!(negotiator.answer().await, Err(Error::InvalidState(_))));
        assert!(matches!(negotiator.delete().await, Err(Error::InvalidState(_))));
        assert_eq!(negotiator.state(), NegotiationState::Idle);
    }
}
