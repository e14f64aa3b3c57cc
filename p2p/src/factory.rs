use crate::http::{peer_http_client, HttpChatClient};
use crate::udp::UdpChatClient;
use crate::websocket::WebSocketChatClient;
use libchat::{ChatClient, ClientFactory, PeerAddress, Protocol, TransportError};
use std::sync::Arc;

/// Picks the concrete transport from the peer's protocol tag.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    http: reqwest::Client,
}

impl TransportFactory {
    pub fn new() -> Result<Self, TransportError> {
        Ok(TransportFactory { http: peer_http_client()? })
    }
}

impl ClientFactory for TransportFactory {
    fn create(&self, address: &PeerAddress) -> Arc<dyn ChatClient> {
        match address.protocol {
            Protocol::Http => Arc::new(HttpChatClient::new(self.http.clone(), &address.host, address.port)),
            Protocol::Udp => Arc::new(UdpChatClient::new(&address.host, address.port)),
            Protocol::WebSocket => Arc::new(WebSocketChatClient::new(&address.host, address.port)),
        }
    }
}
