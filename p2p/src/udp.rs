//! Datagram transport. One JSON-encoded message per UDP datagram, no acknowledgement.
use crate::errors::ServerError;
use async_trait::async_trait;
use futures::channel::oneshot;
use libchat::{ChatClient, Message, MessageListener, TransportError};
use log::*;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::OnceCell;

/// The largest UDP payload that fits in an IPv4 datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

pub struct UdpChatClient {
    host: String,
    port: u16,
    socket: OnceCell<BoundSocket>,
}

/// A local socket together with the peer address it was bound for.
struct BoundSocket {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpChatClient {
    pub fn new(host: &str, port: u16) -> Self {
        UdpChatClient { host: host.to_string(), port, socket: OnceCell::new() }
    }

    /// Resolves the peer once and binds an ephemeral socket of the same address family.
    async fn socket(&self) -> Result<&BoundSocket, TransportError> {
        self.socket
            .get_or_try_init(|| async {
                let unresolved = || {
                    let reason = format!("{}:{} did not resolve to an address", self.host, self.port);
                    TransportError::ConnectionFailed(reason)
                };
                let target = lookup_host((self.host.as_str(), self.port)).await?.next().ok_or_else(unresolved)?;
                let socket = UdpSocket::bind(local_bind_addr(&target)).await?;
                trace!("Bound {} for datagrams to {target}", socket.local_addr()?);
                Ok::<_, TransportError>(BoundSocket { socket, target })
            })
            .await
    }
}

/// The wildcard address of the same family as `target`, with an OS-assigned port.
fn local_bind_addr(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    }
}

#[async_trait]
impl ChatClient for UdpChatClient {
    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(message)?;
        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::PayloadTooLarge(payload.len()));
        }
        let bound = self.socket().await?;
        let sent = bound.socket.send_to(&payload, bound.target).await?;
        trace!("Sent {sent} byte datagram to {}", bound.target);
        Ok(())
    }
}

pub(crate) async fn serve_udp(
    socket: UdpSocket,
    listener: Arc<dyn MessageListener>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<(), ServerError> {
    let mut buf = vec![0u8; u16::MAX as usize];
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => match serde_json::from_slice::<Message>(&buf[..len]) {
                    Ok(message) => {
                        debug!("UDP message received from {from}");
                        listener.message_received(message);
                    }
                    Err(err) => warn!("Dropping undecodable datagram from {from}: {err}"),
                },
                Err(err) => warn!("UDP receive failed: {err}"),
            },
        }
    }
    info!("UDP chat server stopped");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bind_address_follows_target_family() {
        let v4: SocketAddr = "10.0.0.2:8082".parse().unwrap();
        let v6: SocketAddr = "[2001:db8::1]:8082".parse().unwrap();
        assert_eq!(local_bind_addr(&v4), "0.0.0.0:0".parse::<SocketAddr>().unwrap());
        assert_eq!(local_bind_addr(&v6), "[::]:0".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn sends_to_ipv6_peer() {
        env_logger::try_init().ok();
        // Hosts without IPv6 loopback cannot run this exchange.
        let Ok(peer) = UdpSocket::bind(("::1", 0)).await else {
            warn!("IPv6 loopback unavailable, skipping");
            return;
        };
        let port = peer.local_addr().unwrap().port();
        let client = UdpChatClient::new("::1", port);
        client.send_message(&Message::new("alice", "over v6")).await.expect("send over IPv6");

        let mut buf = vec![0u8; 1024];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), peer.recv_from(&mut buf)).await.unwrap().unwrap();
        let message = serde_json::from_slice::<Message>(&buf[..len]).unwrap();
        assert_eq!(message, Message::new("alice", "over v6"));
    }
}
