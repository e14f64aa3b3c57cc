use libchat::{RegistryError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error. {0}")]
    IoError(#[from] std::io::Error),
    #[error("The server task ended abnormally. {0}")]
    TaskFailed(String),
}

/// Collapses a `reqwest` failure into the registry error taxonomy.
pub(crate) fn registry_error(err: reqwest::Error) -> RegistryError {
    if err.is_decode() {
        return RegistryError::InvalidResponse(err.to_string());
    }
    match err.status() {
        Some(status) => RegistryError::Status(status.as_u16()),
        None => RegistryError::Unreachable(err.to_string()),
    }
}

pub(crate) fn http_transport_error(err: reqwest::Error) -> TransportError {
    match err.status() {
        Some(status) => TransportError::Rejected(status.as_u16()),
        None => TransportError::ConnectionFailed(err.to_string()),
    }
}

pub(crate) fn websocket_error(err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::ConnectionFailed(err.to_string())
}
