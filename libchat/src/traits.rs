use crate::error::{RegistryError, TransportError};
use crate::message::{Message, PeerAddress, UserInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A connection to one peer over one wire protocol.
///
/// Implementations are shared between concurrent send tasks, so `send_message` takes `&self`. Any connection state
/// must be guarded internally.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(&self, message: &Message) -> Result<(), TransportError>;
}

/// Builds the protocol-appropriate [`ChatClient`] for a peer address.
pub trait ClientFactory: Send + Sync {
    fn create(&self, address: &PeerAddress) -> Arc<dyn ChatClient>;
}

/// The directory service that knows which peers are online and how to reach them.
#[async_trait]
pub trait Registry: Send + Sync {
    /// All currently registered peers. There are no partial results: either the full listing or an error.
    async fn list(&self) -> Result<HashMap<String, PeerAddress>, RegistryError>;

    async fn register(&self, user: &UserInfo) -> Result<(), RegistryError>;

    async fn unregister(&self, name: &str) -> Result<(), RegistryError>;
}

/// Called by the inbound transports once per received message. May be called concurrently from several tasks.
pub trait MessageListener: Send + Sync {
    fn message_received(&self, message: Message);
}
