use crate::message::PeerAddress;
use crate::traits::{ChatClient, ClientFactory};
use log::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type PeerMap = HashMap<String, PeerAddress>;

/// The local snapshot of the registry: peer name to address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerDirectory {
    peers: PeerMap,
}

impl PeerDirectory {
    pub fn new(peers: PeerMap) -> Self {
        PeerDirectory { peers }
    }

    pub fn get(&self, name: &str) -> Option<&PeerAddress> {
        self.peers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.peers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.peers.keys()
    }

    /// Entries ordered by peer name.
    pub fn sorted(&self) -> Vec<(&String, &PeerAddress)> {
        let mut entries = self.peers.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

impl From<PeerMap> for PeerDirectory {
    fn from(peers: PeerMap) -> Self {
        PeerDirectory::new(peers)
    }
}

struct PooledClient {
    /// The address the client was built for.
    address: PeerAddress,
    client: Arc<dyn ChatClient>,
}

/// Lazily created protocol clients, at most one per peer name.
#[derive(Default)]
pub struct ClientPool {
    clients: HashMap<String, PooledClient>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled client for `name`, creating it with `factory` if there is none yet.
    pub fn get_or_create(
        &mut self,
        name: &str,
        address: &PeerAddress,
        factory: &dyn ClientFactory,
    ) -> Arc<dyn ChatClient> {
        let pooled = self.clients.entry(name.to_string()).or_insert_with(|| {
            debug!("Creating {} client for {name} at {address}", address.protocol);
            PooledClient { address: address.clone(), client: factory.create(address) }
        });
        Arc::clone(&pooled.client)
    }

    /// Drops every client whose peer is gone from `directory`, or whose address has changed since the client was
    /// created. Returns the names of the evicted peers.
    pub fn retain_current(&mut self, directory: &PeerDirectory) -> Vec<String> {
        let mut evicted = Vec::new();
        self.clients.retain(|name, pooled| {
            let keep = directory.get(name) == Some(&pooled.address);
            if !keep {
                evicted.push(name.clone());
            }
            keep
        });
        evicted
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

struct PeerBookInner {
    directory: PeerDirectory,
    pool: ClientPool,
}

/// The directory and client pool, shared between the read loop and the send tasks.
///
/// Both live behind a single lock: a refresh is applied to the directory and the pool in one step, and client
/// creation is atomic per peer. The lock is never held while a message is on the wire.
#[derive(Clone)]
pub struct PeerBook {
    inner: Arc<Mutex<PeerBookInner>>,
    factory: Arc<dyn ClientFactory>,
}

impl PeerBook {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        let inner = PeerBookInner { directory: PeerDirectory::default(), pool: ClientPool::new() };
        PeerBook { inner: Arc::new(Mutex::new(inner)), factory }
    }

    /// Replaces the directory wholesale and prunes stale clients. Returns a snapshot of the new directory.
    pub async fn replace_directory(&self, peers: PeerMap) -> PeerDirectory {
        let directory = PeerDirectory::new(peers);
        let mut book = self.inner.lock().await;
        let evicted = book.pool.retain_current(&directory);
        if !evicted.is_empty() {
            debug!("Released clients for {}", evicted.join(", "));
        }
        book.directory = directory.clone();
        trace!("Directory replaced. {} peers, {} pooled clients", book.directory.len(), book.pool.len());
        directory
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.inner.lock().await.directory.contains(name)
    }

    pub async fn directory(&self) -> PeerDirectory {
        self.inner.lock().await.directory.clone()
    }

    /// Resolves `name` to its pooled client, creating the client on first use. `None` if the peer is not in the
    /// directory.
    pub async fn client_for(&self, name: &str) -> Option<Arc<dyn ChatClient>> {
        self.resolve(name).await.map(|(_, client)| client)
    }

    /// Like [`PeerBook::client_for`], but also returns the address the client was looked up under. Both come from
    /// the same directory snapshot.
    pub async fn resolve(&self, name: &str) -> Option<(PeerAddress, Arc<dyn ChatClient>)> {
        let mut book = self.inner.lock().await;
        let PeerBookInner { directory, pool } = &mut *book;
        let address = directory.get(name)?;
        let client = pool.get_or_create(name, address, self.factory.as_ref());
        Some((address.clone(), client))
    }

    pub async fn pooled_clients(&self) -> usize {
        self.inner.lock().await.pool.len()
    }

    pub async fn is_pooled(&self, name: &str) -> bool {
        self.inner.lock().await.pool.contains(name)
    }
}
