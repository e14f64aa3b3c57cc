use std::time::Duration;
use thiserror::Error;

/// Failure to deliver a single message to a peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error. {0}")]
    IoError(#[from] std::io::Error),
    #[error("Could not encode message. {0}")]
    EncodingError(#[from] serde_json::Error),
    #[error("Message of {0} bytes does not fit in a single datagram")]
    PayloadTooLarge(usize),
    #[error("Peer rejected the message with status {0}")]
    Rejected(u16),
    #[error("Connection failed. {0}")]
    ConnectionFailed(String),
    #[error("No response from peer after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),
    #[error("Registry could not be reached. {0}")]
    Unreachable(String),
    #[error("Registry answered with status {0}")]
    Status(u16),
    #[error("Invalid registry response. {0}")]
    InvalidResponse(String),
}
