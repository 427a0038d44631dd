//! Connection manager for one execution stream.
//!
//! The manager owns at most one transport and at most one pending retry.
//! Transports report through a tagged event queue; events from any
//! transport other than the tracked one are ignored, so a superseded
//! transport can never trigger a reconnect.

use std::{sync::Arc, time::Duration};

use exec_stream_core::{
    Callbacks, CloseEvent, ExecutionMessage, ExecutionStatus, ExponentialBackoff, Origin,
    ReadyState, ReconnectionStrategy, StatusShadow, build_stream_url, dispatch,
    status::{connect_skip_reason, reconnect_skip_reason},
    validation::{NORMAL_CLOSURE, sanitize_delay},
};
use tokio::{
    sync::mpsc,
    time::{Instant, sleep_until},
};
use tracing::Span;

use crate::{
    config::StreamConfig,
    transport::{
        ConnectionId, EventQueue, EventSender, Transport, TransportError, TransportEvent,
        TransportFactory,
    },
};

/// Connection status strings passed to the status sink.
pub mod connection_status {
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const ERROR: &str = "error";
}

/// Reason sent when the execution reaches a terminal status.
pub const EXECUTION_COMPLETED_REASON: &str = "Execution completed";

const UNKNOWN_ERROR: &str = "Unknown WebSocket error";
const CREATE_FAILED: &str = "Failed to create WebSocket connection";

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and nothing scheduled.
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
    /// No transport; a retry timer is armed.
    ReconnectPending,
}

/// A scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryInfo {
    /// Attempt number the retry belongs to (1-based).
    pub attempt: u32,
    /// Delay the retry was armed with.
    pub delay: Duration,
}

struct PendingRetry {
    deadline: Instant,
    info: RetryInfo,
    callbacks: Arc<Callbacks>,
}

struct Tracked {
    id: ConnectionId,
    url: String,
    transport: Box<dyn Transport>,
    callbacks: Arc<Callbacks>,
}

/// Manages the stream connection for one execution.
pub struct ConnectionManager {
    execution_id: Option<String>,
    status: StatusShadow,
    max_attempts: u32,
    base_delay: Duration,
    origin: Option<Origin>,
    factory: Arc<dyn TransportFactory>,
    strategy: Box<dyn ReconnectionStrategy>,
    span: Span,
    events_tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    events_rx: EventQueue,
    transport: Option<Tracked>,
    opened: bool,
    attempts: u32,
    retry: Option<PendingRetry>,
}

impl ConnectionManager {
    /// Create a manager with no execution target yet.
    #[must_use]
    pub fn new(config: &StreamConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let (events_tx, events_rx) = EventSender::channel();
        Self {
            execution_id: None,
            status: StatusShadow::default(),
            max_attempts: config.max_reconnect_attempts,
            base_delay: config.base_delay(),
            origin: config.origin.clone(),
            factory,
            strategy: Box::new(ExponentialBackoff),
            span: Span::none(),
            events_tx,
            events_rx,
            transport: None,
            opened: false,
            attempts: 0,
            retry: None,
        }
    }

    /// Create a manager backed by real WebSocket transports.
    #[cfg(feature = "websocket")]
    #[must_use]
    pub fn websocket(config: &StreamConfig) -> Self {
        Self::new(config, Arc::new(crate::websocket::WebSocketFactory))
    }

    #[must_use]
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// Seed both status slots.
    #[must_use]
    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = StatusShadow::new(Some(status));
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    /// Span every log line of this manager is recorded in.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Open the stream if the target is admissible.
    ///
    /// Any existing transport and pending retry are dropped first.
    pub fn connect(&mut self, callbacks: impl Into<Arc<Callbacks>>) {
        let span = self.span.clone();
        let _enter = span.enter();
        let callbacks = callbacks.into();

        if let Some(reason) = connect_skip_reason(
            self.execution_id.as_deref(),
            self.status.current(),
            self.status.last_known(),
        ) {
            tracing::debug!(
                execution_id = self.execution_id.as_deref().unwrap_or_default(),
                status = ?self.status.effective(),
                "Skipping connection: {reason}"
            );
            return;
        }

        self.close(None);

        let Some(execution_id) = self.execution_id.as_deref() else {
            return;
        };
        let url = build_stream_url(execution_id, self.origin.as_ref());
        tracing::debug!(%url, "Connecting");

        let id = ConnectionId::new();
        let events = EventSender::new(id, self.events_tx.clone());
        match self.factory.create(&url, events) {
            Ok(transport) => {
                self.transport = Some(Tracked {
                    id,
                    url,
                    transport,
                    callbacks,
                });
            }
            Err(e) => {
                tracing::error!(
                    execution_id,
                    error = %e,
                    "Failed to create connection"
                );
                self.opened = false;
                callbacks.emit_status(connection_status::ERROR);
                let message = e.to_string();
                callbacks.emit_error(or_fallback(Some(&message), CREATE_FAILED));
            }
        }
    }

    /// Close the stream and cancel any pending retry. Idempotent.
    pub fn close(&mut self, reason: Option<&str>) {
        if self.retry.take().is_some() {
            tracing::debug!(parent: &self.span, "Cancelled pending reconnect");
        }
        if let Some(mut tracked) = self.transport.take() {
            tracked.transport.close(NORMAL_CLOSURE, reason);
        }
        self.opened = false;
    }

    /// Record a new execution status; a terminal status tears the stream down.
    pub fn update_status(&mut self, status: Option<ExecutionStatus>) {
        self.status.update(status);
        if !self.status.is_terminated() {
            return;
        }

        if let Some(mut tracked) = self.transport.take() {
            tracing::debug!(
                parent: &self.span,
                execution_id = self.execution_id.as_deref().unwrap_or_default(),
                status = ?self.status.effective(),
                "Closing connection for terminated execution"
            );
            tracked
                .transport
                .close(NORMAL_CLOSURE, Some(EXECUTION_COMPLETED_REASON));
        }
        self.retry = None;
        self.opened = false;
    }

    /// Switch to another execution. Resets the attempt counter.
    pub fn update_execution_id(&mut self, execution_id: Option<String>) {
        self.execution_id = execution_id;
        self.attempts = 0;
        self.retry = None;
    }

    /// Send a text frame on the live transport.
    ///
    /// # Errors
    /// Returns `NotConnected` unless the stream is open.
    pub fn send(&self, text: &str) -> Result<(), TransportError> {
        match &self.transport {
            Some(tracked) if self.is_connected() => tracked.transport.send(text),
            _ => Err(TransportError::NotConnected),
        }
    }

    /// Opened, tracked, and the transport itself reports `Open`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        if !self.opened {
            return false;
        }
        self.transport
            .as_ref()
            .is_some_and(|t| t.transport.ready_state().is_open())
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        match &self.transport {
            Some(tracked) => match tracked.transport.ready_state() {
                ReadyState::Connecting => ConnectionState::Connecting,
                ReadyState::Open => ConnectionState::Open,
                ReadyState::Closing => ConnectionState::Closing,
                ReadyState::Closed => ConnectionState::Closed,
            },
            None if self.retry.is_some() => ConnectionState::ReconnectPending,
            None => ConnectionState::Idle,
        }
    }

    /// Consecutive reconnect attempts since the last open or target change.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn pending_retry(&self) -> Option<RetryInfo> {
        self.retry.as_ref().map(|r| r.info)
    }

    #[must_use]
    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    /// Current status, falling back to the last known one.
    #[must_use]
    pub fn status(&self) -> Option<ExecutionStatus> {
        self.status.effective()
    }

    /// URL of the tracked transport.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.transport.as_ref().map(|t| t.url.as_str())
    }

    /// Handle queued events and an expired retry without waiting.
    ///
    /// Returns the number of events handled (a fired retry counts as one).
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            while let Ok((id, event)) = self.events_rx.try_recv() {
                self.handle_event(id, event);
                handled += 1;
            }
            let due = self
                .retry
                .as_ref()
                .is_some_and(|r| r.deadline <= Instant::now());
            if !due {
                return handled;
            }
            self.fire_retry();
            handled += 1;
        }
    }

    /// Wait for and handle the next event or retry deadline.
    ///
    /// Returns `false` when there is nothing left to wait for.
    pub async fn turn(&mut self) -> bool {
        if self.transport.is_none() && self.retry.is_none() {
            self.process_pending();
            return false;
        }
        let deadline = self.retry.as_ref().map(|r| r.deadline);

        tokio::select! {
            Some((id, event)) = self.events_rx.recv() => self.handle_event(id, event),
            () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                self.fire_retry();
            }
        }
        true
    }

    /// Drive the stream until it is closed for good.
    pub async fn run(&mut self) {
        while self.turn().await {}
    }

    fn fire_retry(&mut self) {
        let Some(retry) = self.retry.take() else {
            return;
        };
        if self.attempts <= self.max_attempts {
            self.connect(retry.callbacks);
        }
    }

    fn handle_event(&mut self, id: ConnectionId, event: TransportEvent) {
        let span = self.span.clone();
        let _enter = span.enter();

        let Some(tracked) = self.transport.as_ref().filter(|t| t.id == id) else {
            tracing::trace!(connection = %id, "Ignoring event from superseded connection");
            return;
        };

        match event {
            TransportEvent::Open => {
                tracing::debug!(
                    execution_id = self.execution_id.as_deref().unwrap_or_default(),
                    "Connected"
                );
                self.opened = true;
                self.attempts = 0;
                tracked.callbacks.emit_status(connection_status::CONNECTED);
            }
            TransportEvent::Message(text) => match ExecutionMessage::parse(&text) {
                Ok(message) => dispatch(&message, &tracked.callbacks),
                Err(e) => tracing::error!("Failed to parse message: {e}"),
            },
            TransportEvent::Error(message) => {
                let message = or_fallback(message.as_deref(), UNKNOWN_ERROR);
                tracing::error!(
                    execution_id = self.execution_id.as_deref().unwrap_or_default(),
                    ready_state = %tracked.transport.ready_state(),
                    url = %tracked.url,
                    "Connection error: {message}"
                );
                let callbacks = Arc::clone(&tracked.callbacks);
                self.opened = false;
                callbacks.emit_status(connection_status::ERROR);
            }
            TransportEvent::Close(close) => {
                let Some(tracked) = self.transport.take() else {
                    return;
                };
                tracing::debug!(
                    execution_id = self.execution_id.as_deref().unwrap_or_default(),
                    code = close.code,
                    reason = close.reason_or_default(),
                    was_clean = close.was_clean,
                    attempts = self.attempts,
                    "Disconnected"
                );
                self.opened = false;
                tracked.callbacks.emit_status(connection_status::DISCONNECTED);
                self.handle_reconnection(&close, tracked.callbacks);
            }
        }
    }

    fn handle_reconnection(&mut self, close: &CloseEvent, callbacks: Arc<Callbacks>) {
        if let Some(reason) = reconnect_skip_reason(
            close,
            self.attempts,
            self.max_attempts,
            self.execution_id.as_deref(),
            self.status.current(),
            self.status.last_known(),
        ) {
            tracing::debug!(
                execution_id = self.execution_id.as_deref().unwrap_or_default(),
                code = close.code,
                "Not reconnecting: {reason}"
            );
            return;
        }
        if !self
            .strategy
            .should_reconnect(self.attempts, self.max_attempts)
        {
            tracing::debug!(
                execution_id = self.execution_id.as_deref().unwrap_or_default(),
                attempts = self.attempts,
                "Not reconnecting: refused by reconnection strategy"
            );
            return;
        }

        self.attempts += 1;
        let delay = sanitize_delay(self.strategy.calculate_delay(self.attempts, self.base_delay));
        tracing::debug!(
            "Reconnecting in {}ms (attempt {}/{})",
            delay.as_millis(),
            self.attempts,
            self.max_attempts
        );

        // The retry stays armed even when this attempt exhausts the budget;
        // the failure notification below is emitted alongside it.
        self.retry = Some(PendingRetry {
            deadline: Instant::now() + delay,
            info: RetryInfo {
                attempt: self.attempts,
                delay,
            },
            callbacks: Arc::clone(&callbacks),
        });

        if self.attempts >= self.max_attempts {
            tracing::warn!(
                execution_id = self.execution_id.as_deref().unwrap_or_default(),
                "Max reconnect attempts reached"
            );
            callbacks.emit_error(&format!(
                "WebSocket connection failed after {} attempts",
                self.max_attempts
            ));
        }
    }
}

/// `message` unless it is missing or empty.
fn or_fallback<'a>(message: Option<&'a str>, fallback: &'a str) -> &'a str {
    message.filter(|m| !m.is_empty()).unwrap_or(fallback)
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close(None);
    }
}
