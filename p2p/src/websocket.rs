//! Persistent-socket transport. The client keeps one WebSocket open per peer and writes each message as a JSON text
//! frame.
use crate::errors::{websocket_error, ServerError};
use async_trait::async_trait;
use futures::channel::oneshot;
use futures::{SinkExt, StreamExt};
use libchat::{ChatClient, Message, MessageListener, TransportError};
use log::*;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{accept_async, connect_async, MaybeTlsStream, WebSocketStream};

pub const WEBSOCKET_PATH: &str = "/v1/ws/message";

type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketChatClient {
    url: String,
    stream: Mutex<Option<ClientStream>>,
}

impl WebSocketChatClient {
    pub fn new(host: &str, port: u16) -> Self {
        WebSocketChatClient { url: format!("ws://{host}:{port}{WEBSOCKET_PATH}"), stream: Mutex::new(None) }
    }
}

#[async_trait]
impl ChatClient for WebSocketChatClient {
    /// Connects on first use. A send error drops the socket so that the next send reconnects.
    async fn send_message(&self, message: &Message) -> Result<(), TransportError> {
        let text = serde_json::to_string(message)?;
        let mut stream = self.stream.lock().await;
        if stream.is_none() {
            debug!("Opening WebSocket to {}", self.url);
            let (socket, _) = connect_async(self.url.as_str()).await.map_err(websocket_error)?;
            *stream = Some(socket);
        }
        let Some(socket) = stream.as_mut() else {
            return Err(TransportError::ConnectionFailed(format!("No open WebSocket to {}", self.url)));
        };
        let sent = socket.send(Frame::Text(text)).await;
        if let Err(err) = sent {
            *stream = None;
            return Err(websocket_error(err));
        }
        Ok(())
    }
}

async fn read_frames(stream: TcpStream, listener: Arc<dyn MessageListener>) -> Result<(), ServerError> {
    let peer = stream.peer_addr()?;
    let mut socket = accept_async(stream).await.map_err(|e| ServerError::TaskFailed(e.to_string()))?;
    trace!("WebSocket connection from {peer} accepted");
    while let Some(frame) = socket.next().await {
        match frame {
            Ok(Frame::Text(text)) => match serde_json::from_str::<Message>(&text) {
                Ok(message) => listener.message_received(message),
                Err(err) => warn!("Dropping undecodable frame from {peer}: {err}"),
            },
            Ok(Frame::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!("WebSocket connection from {peer} failed: {err}");
                break;
            }
        }
    }
    trace!("WebSocket connection from {peer} closed");
    Ok(())
}

pub(crate) async fn serve_websocket(
    socket: TcpListener,
    listener: Arc<dyn MessageListener>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<(), ServerError> {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = socket.accept() => match accepted {
                Ok((stream, _)) => {
                    let listener = Arc::clone(&listener);
                    tokio::spawn(async move {
                        if let Err(err) = read_frames(stream, listener).await {
                            warn!("WebSocket connection error: {err}");
                        }
                    });
                }
                Err(err) => warn!("Could not accept WebSocket connection: {err}"),
            },
        }
    }
    info!("WebSocket chat server stopped");
    Ok(())
}
