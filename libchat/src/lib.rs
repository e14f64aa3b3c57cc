//! Core types and contracts of the peer-to-peer chat client.
//!
//! The session orchestrator only talks to the world through the traits in [`traits`]: a [`Registry`] lists the
//! peers, a [`ClientFactory`] builds one [`ChatClient`] per peer, and inbound transports call a
//! [`MessageListener`]. [`PeerBook`] holds the directory snapshot and the client pool behind one lock.
pub mod error;
pub mod message;
pub mod peers;
pub mod traits;

#[cfg(feature = "dummy_impl")]
pub mod dummy_impl;

pub use error::{RegistryError, TransportError};
pub use message::{Message, PeerAddress, Protocol, UnknownProtocol, UserInfo};
pub use peers::{ClientPool, PeerBook, PeerDirectory, PeerMap};
pub use traits::{ChatClient, ClientFactory, MessageListener, Registry};
