//! In-memory stand-ins for the registry, the transports and the inbound listener.
use crate::error::{RegistryError, TransportError};
use crate::message::{Message, PeerAddress, UserInfo};
use crate::peers::PeerMap;
use crate::traits::{ChatClient, ClientFactory, MessageListener, Registry};
use async_trait::async_trait;
use log::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A registry that replays a script of listings. `None` entries simulate an unreachable registry. Once the script
/// runs out, the last answer is repeated.
#[derive(Default)]
pub struct DummyRegistry {
    script: Mutex<VecDeque<Option<PeerMap>>>,
    last: Mutex<Option<PeerMap>>,
    list_calls: AtomicUsize,
    registered: Mutex<Vec<UserInfo>>,
}

impl DummyRegistry {
    pub fn with_peers(peers: PeerMap) -> Self {
        Self::scripted(vec![Some(peers)])
    }

    pub fn scripted(script: Vec<Option<PeerMap>>) -> Self {
        DummyRegistry { script: Mutex::new(script.into()), ..Default::default() }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn registered(&self) -> Vec<UserInfo> {
        locked(&self.registered).clone()
    }
}

#[async_trait]
impl Registry for DummyRegistry {
    async fn list(&self) -> Result<PeerMap, RegistryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut last = locked(&self.last);
        if let Some(next) = locked(&self.script).pop_front() {
            *last = next;
        }
        last.clone().ok_or_else(|| RegistryError::Unreachable("dummy registry is offline".into()))
    }

    async fn register(&self, user: &UserInfo) -> Result<(), RegistryError> {
        info!("Dummy registry: registering {}", user.name);
        locked(&self.registered).push(user.clone());
        Ok(())
    }

    async fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        locked(&self.registered).retain(|u| u.name != name);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingLog {
    created: Mutex<Vec<PeerAddress>>,
    sent: Mutex<Vec<(PeerAddress, Message)>>,
    failing: AtomicBool,
}

/// A [`ClientFactory`] whose clients record every message instead of putting it on the wire.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    log: Arc<RecordingLog>,
}

impl RecordingFactory {
    /// A factory whose clients fail every send.
    pub fn failing() -> Self {
        let factory = Self::default();
        factory.set_failing(true);
        factory
    }

    pub fn set_failing(&self, failing: bool) {
        self.log.failing.store(failing, Ordering::SeqCst);
    }

    /// Addresses of every client created so far, in creation order.
    pub fn created(&self) -> Vec<PeerAddress> {
        locked(&self.log.created).clone()
    }

    pub fn sent(&self) -> Vec<(PeerAddress, Message)> {
        locked(&self.log.sent).clone()
    }
}

impl ClientFactory for RecordingFactory {
    fn create(&self, address: &PeerAddress) -> Arc<dyn ChatClient> {
        locked(&self.log.created).push(address.clone());
        Arc::new(RecordingClient { address: address.clone(), log: Arc::clone(&self.log) })
    }
}

pub struct RecordingClient {
    address: PeerAddress,
    log: Arc<RecordingLog>,
}

#[async_trait]
impl ChatClient for RecordingClient {
    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        if self.log.failing.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(format!("simulated failure reaching {}", self.address)));
        }
        locked(&self.log.sent).push((self.address.clone(), message.clone()));
        Ok(())
    }
}

/// Forwards every received message into a channel.
pub struct ChannelListener {
    sender: mpsc::UnboundedSender<Message>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (ChannelListener { sender }, receiver)
    }
}

impl MessageListener for ChannelListener {
    fn message_received(&self, message: Message) {
        if self.sender.send(message).is_err() {
            warn!("Message dropped. The receiving end of the listener channel is closed");
        }
    }
}
