//! Routing of parsed messages to caller sinks.

use std::fmt;

use serde_json::Value;

use crate::protocol::{ExecutionMessage, LogEntry};

type LogSink = Box<dyn Fn(&LogEntry) + Send + Sync>;
type TextSink = Box<dyn Fn(&str) + Send + Sync>;
type NodeSink = Box<dyn Fn(&str, &Value) + Send + Sync>;
type CompletionSink = Box<dyn Fn(Option<&Value>) + Send + Sync>;

/// Caller sinks, one per notification class. Each is optional; a missing
/// sink drops that class silently.
#[derive(Default)]
pub struct Callbacks {
    on_log: Option<LogSink>,
    on_status: Option<TextSink>,
    on_node_update: Option<NodeSink>,
    on_completion: Option<CompletionSink>,
    on_error: Option<TextSink>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive log entries.
    #[must_use]
    pub fn on_log(mut self, f: impl Fn(&LogEntry) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Box::new(f));
        self
    }

    /// Receive execution status strings and connection status
    /// (`connected`, `disconnected`, `error`).
    #[must_use]
    pub fn on_status(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    /// Receive `(node_id, node_state)` pairs.
    #[must_use]
    pub fn on_node_update(mut self, f: impl Fn(&str, &Value) + Send + Sync + 'static) -> Self {
        self.on_node_update = Some(Box::new(f));
        self
    }

    /// Receive the completion result, which may be absent.
    #[must_use]
    pub fn on_completion(mut self, f: impl Fn(Option<&Value>) + Send + Sync + 'static) -> Self {
        self.on_completion = Some(Box::new(f));
        self
    }

    /// Receive error text from the server or the connection layer.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn emit_log(&self, entry: &LogEntry) {
        if let Some(sink) = &self.on_log {
            sink(entry);
        }
    }

    pub fn emit_status(&self, status: &str) {
        if let Some(sink) = &self.on_status {
            sink(status);
        }
    }

    pub fn emit_node_update(&self, node_id: &str, node_state: &Value) {
        if let Some(sink) = &self.on_node_update {
            sink(node_id, node_state);
        }
    }

    pub fn emit_completion(&self, result: Option<&Value>) {
        if let Some(sink) = &self.on_completion {
            sink(result);
        }
    }

    pub fn emit_error(&self, error: &str) {
        if let Some(sink) = &self.on_error {
            sink(error);
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_log", &self.on_log.is_some())
            .field("on_status", &self.on_status.is_some())
            .field("on_node_update", &self.on_node_update.is_some())
            .field("on_completion", &self.on_completion.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Route `message` to the matching sink.
pub fn dispatch(message: &ExecutionMessage, callbacks: &Callbacks) {
    match message {
        ExecutionMessage::Log { log, .. } => {
            if let Some(entry) = log {
                callbacks.emit_log(entry);
            }
        }
        ExecutionMessage::Status { status, .. } => {
            if let Some(status) = status.as_deref().filter(|s| !s.is_empty()) {
                callbacks.emit_status(status);
            }
        }
        ExecutionMessage::NodeUpdate { node_state, .. } => {
            if let (Some(state), Some(node_id)) = (node_state, message.resolved_node_id()) {
                callbacks.emit_node_update(node_id, state);
            }
        }
        ExecutionMessage::Completion { result, .. } => {
            callbacks.emit_completion(result.as_ref());
        }
        ExecutionMessage::Error { error, .. } => {
            if let Some(error) = error.as_deref().filter(|e| !e.is_empty()) {
                callbacks.emit_error(error);
            }
        }
        ExecutionMessage::Unknown => {}
    }
}
