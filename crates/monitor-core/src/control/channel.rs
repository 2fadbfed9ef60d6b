//! UDP control socket to the relay

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info};

use super::command::ControlCommand;
use crate::error::{Error, Result};

/// Receive buffer for control replies (about one MTU)
const CONTROL_BUFFER_SIZE: usize = 1500;

/// Bind an ephemeral UDP socket of `remote`'s address family and connect it
pub(crate) async fn connect_udp(remote: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if remote.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| Error::connectivity(remote.to_string(), e))?;
    socket
        .connect(remote)
        .await
        .map_err(|e| Error::connectivity(remote.to_string(), e))?;
    Ok(socket)
}

/// Request/reply channel to the relay's control socket.
///
/// Every exchange is one request datagram and one reply datagram. Waiting
/// for the reply is bounded by the reply timeout so an unreachable relay
/// fails startup instead of hanging it.
#[derive(Debug)]
pub struct ControlChannel {
    socket: UdpSocket,
    relay: SocketAddr,
    reply_timeout: Duration,
}

impl ControlChannel {
    /// Resolve the relay and open a connected control socket
    pub async fn connect(host: &str, port: u16, reply_timeout: Duration) -> Result<Self> {
        let endpoint = format!("{}:{}", host, port);
        let relay = lookup_host((host, port))
            .await
            .map_err(|e| Error::connectivity(endpoint.clone(), e))?
            .next()
            .ok_or_else(|| {
                Error::connectivity(
                    endpoint.clone(),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"),
                )
            })?;

        let socket = connect_udp(relay).await?;
        info!(relay = %relay, "control channel connected");

        Ok(Self {
            socket,
            relay,
            reply_timeout,
        })
    }

    /// Send `command` and wait for a single reply datagram.
    ///
    /// Returns the reply with trailing whitespace removed.
    pub async fn exchange(&self, command: &ControlCommand) -> Result<String> {
        let request = command.to_string();
        info!(command = command.name(), request = %request, "control request");

        self.socket
            .send(request.as_bytes())
            .await
            .map_err(|e| Error::connectivity(self.relay.to_string(), e))?;

        let mut buffer = [0u8; CONTROL_BUFFER_SIZE];
        let len = tokio::time::timeout(self.reply_timeout, self.socket.recv(&mut buffer))
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("{} reply from {}", command.name(), self.relay),
                after: self.reply_timeout,
            })?
            .map_err(|e| Error::connectivity(self.relay.to_string(), e))?;

        let reply = String::from_utf8_lossy(&buffer[..len]).trim_end().to_string();
        info!(command = command.name(), reply = %reply, "control reply");
        debug!(bytes = len, "control reply size");
        Ok(reply)
    }
}
