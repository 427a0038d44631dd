//! Transport abstraction used by the connection manager.
//!
//! A transport is created synchronously by a [`TransportFactory`] and
//! reports everything that happens to it through the [`EventSender`] it was
//! handed. The manager owns the receiving end and is the only place events
//! are acted on.

use std::fmt;

use exec_stream_core::{CloseEvent, ReadyState};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("No async runtime available")]
    NoRuntime,
    #[error("Not connected")]
    NotConnected,
    #[error("Transport closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Identity of one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Something that happened to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake finished.
    Open,
    /// Text frame received.
    Message(String),
    /// Transport-level error, with a message when one is available.
    Error(Option<String>),
    /// Transport closed.
    Close(CloseEvent),
}

pub(crate) type EventQueue = mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>;

/// Handle a transport uses to report events, tagged with its connection id.
#[derive(Debug, Clone)]
pub struct EventSender {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
}

impl EventSender {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<(ConnectionId, TransportEvent)>, EventQueue) {
        mpsc::unbounded_channel()
    }

    pub(crate) const fn new(
        id: ConnectionId,
        tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    ) -> Self {
        Self { id, tx }
    }

    /// Connection this sender reports for.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Report an event. Events sent after the manager is gone are dropped.
    pub fn send(&self, event: TransportEvent) {
        let _ = self.tx.send((self.id, event));
    }

    pub fn opened(&self) {
        self.send(TransportEvent::Open);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.send(TransportEvent::Message(text.into()));
    }

    pub fn error(&self, message: Option<String>) {
        self.send(TransportEvent::Error(message));
    }

    pub fn closed(&self, event: CloseEvent) {
        self.send(TransportEvent::Close(event));
    }
}

/// A live duplex connection.
pub trait Transport: Send {
    /// Current ready state.
    fn ready_state(&self) -> ReadyState;

    /// Send a text frame.
    ///
    /// # Errors
    /// Returns error if the transport cannot accept the frame.
    fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Start a closing handshake. Must be safe to call more than once.
    fn close(&mut self, code: u16, reason: Option<&str>);
}

/// Creates transports for a URL.
pub trait TransportFactory: Send + Sync {
    /// Create a transport.
    ///
    /// # Errors
    /// Returns error if the transport cannot be created at all; later
    /// failures are reported through `events`.
    fn create(&self, url: &str, events: EventSender) -> Result<Box<dyn Transport>, TransportError>;
}
