//! Reconnecting client for execution event streams.
//!
//! Provides:
//! - `ConnectionManager` - Status-gated connect, backoff reconnect, dispatch
//! - Transport traits (`Transport`, `TransportFactory`)
//! - WebSocket transport (feature: websocket)
//! - `StreamConfig` - Environment-driven configuration

pub mod config;
pub mod manager;
pub mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use config::{ConfigError, StreamConfig};
pub use manager::{ConnectionManager, ConnectionState, RetryInfo, connection_status};
pub use transport::{
    ConnectionId, EventSender, Transport, TransportError, TransportEvent, TransportFactory,
};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketFactory;
