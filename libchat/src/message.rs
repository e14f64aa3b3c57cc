use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// The wire protocol a peer accepts messages on. The registry publishes one tag per peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Udp,
    WebSocket,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Udp => "udp",
            Protocol::WebSocket => "ws",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Protocol::Http => "HTTP",
            Protocol::Udp => "UDP",
            Protocol::WebSocket => "WEBSOCKET",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
#[error("Unknown protocol '{0}'. Expected one of http, udp or websocket")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "udp" => Ok(Protocol::Udp),
            "websocket" | "ws" => Ok(Protocol::WebSocket),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

/// How to reach a peer. Obtained from the registry and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new<S: Into<String>>(protocol: Protocol, host: S, port: u16) -> Self {
        PeerAddress { protocol, host: host.into(), port }
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

/// A single chat message. `user` is the name of the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub user: String,
    pub text: String,
}

impl Message {
    pub fn new<U: Into<String>, T: Into<String>>(user: U, text: T) -> Self {
        Message { user: user.into(), text: text.into() }
    }
}

/// The registration record a client publishes about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub address: PeerAddress,
}

impl UserInfo {
    pub fn new<S: Into<String>>(name: S, address: PeerAddress) -> Self {
        UserInfo { name: name.into(), address }
    }
}
