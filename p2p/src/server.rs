use crate::errors::ServerError;
use crate::http::serve_http;
use crate::udp::serve_udp;
use crate::websocket::serve_websocket;
use futures::channel::oneshot;
use libchat::{MessageListener, Protocol};
use log::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

/// A running inbound chat server.
pub struct ServerHandle {
    protocol: Protocol,
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl ServerHandle {
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The bound address. When started on port 0 this carries the port the OS picked.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(self) -> Result<(), ServerError> {
        // The server may already have stopped by itself, in which case nobody is listening.
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(ServerError::TaskFailed(err.to_string())),
        }
    }
}

/// Binds the inbound server for `protocol` on `host:port` and spawns it in the background. Every decoded message is
/// handed to `listener`.
pub async fn start_server(
    protocol: Protocol,
    host: &str,
    port: u16,
    listener: Arc<dyn MessageListener>,
) -> Result<ServerHandle, ServerError> {
    let (shutdown, shutdown_signal) = oneshot::channel();
    let (local_addr, task) = match protocol {
        Protocol::Http => {
            let socket = TcpListener::bind((host, port)).await?;
            let addr = socket.local_addr()?;
            (addr, tokio::spawn(serve_http(socket, listener, shutdown_signal)))
        }
        Protocol::Udp => {
            let socket = UdpSocket::bind((host, port)).await?;
            let addr = socket.local_addr()?;
            (addr, tokio::spawn(serve_udp(socket, listener, shutdown_signal)))
        }
        Protocol::WebSocket => {
            let socket = TcpListener::bind((host, port)).await?;
            let addr = socket.local_addr()?;
            (addr, tokio::spawn(serve_websocket(socket, listener, shutdown_signal)))
        }
    };
    info!("{protocol} chat server listening on {local_addr}");
    Ok(ServerHandle { protocol, local_addr, shutdown, task })
}
