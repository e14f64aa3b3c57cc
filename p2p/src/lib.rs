//! Concrete transports for the chat client: HTTP, UDP and WebSocket clients and servers, plus the HTTP registry
//! client.
pub mod errors;
mod factory;
pub mod http;
mod registry;
mod server;
pub mod udp;
pub mod websocket;

pub use errors::ServerError;
pub use factory::TransportFactory;
pub use http::HttpChatClient;
pub use registry::HttpRegistry;
pub use server::{start_server, ServerHandle};
pub use udp::UdpChatClient;
pub use websocket::WebSocketChatClient;
