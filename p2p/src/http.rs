//! Request/response transport. Every message is one `POST /v1/message` with a JSON body.
use crate::errors::{http_transport_error, ServerError};
use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::channel::oneshot;
use libchat::{ChatClient, Message, MessageListener, TransportError};
use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const MESSAGE_PATH: &str = "/v1/message";
pub const HEALTH_PATH: &str = "/v1/health";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        StatusResponse { status: "ok".to_string() }
    }
}

pub struct HttpChatClient {
    url: String,
    client: reqwest::Client,
}

impl HttpChatClient {
    /// `client` is shared between peers. It keeps its own connection pool per host.
    pub fn new(client: reqwest::Client, host: &str, port: u16) -> Self {
        HttpChatClient { url: format!("http://{host}:{port}{MESSAGE_PATH}"), client }
    }
}

/// The HTTP client used for every peer. Peers are addressed directly, so system proxies are ignored.
pub fn peer_http_client() -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder().no_proxy().build().map_err(http_transport_error)
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        trace!("POST {}", self.url);
        let response = self.client.post(&self.url).json(message).send().await.map_err(http_transport_error)?;
        response.error_for_status().map_err(http_transport_error)?;
        Ok(())
    }
}

async fn health() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

async fn receive_message(
    State(listener): State<Arc<dyn MessageListener>>,
    Json(message): Json<Message>,
) -> Json<StatusResponse> {
    debug!("HTTP message received from {}", message.user);
    listener.message_received(message);
    Json(StatusResponse::ok())
}

pub fn router(listener: Arc<dyn MessageListener>) -> Router {
    Router::new().route(HEALTH_PATH, get(health)).route(MESSAGE_PATH, post(receive_message)).with_state(listener)
}

pub(crate) async fn serve_http(
    socket: TcpListener,
    listener: Arc<dyn MessageListener>,
    shutdown: oneshot::Receiver<()>,
) -> Result<(), ServerError> {
    axum::serve(socket, router(listener))
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await?;
    info!("HTTP chat server stopped");
    Ok(())
}
