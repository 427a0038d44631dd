//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use exec_stream_client::{EventSender, Transport, TransportError, TransportFactory};
use exec_stream_core::{Callbacks, CloseEvent, ReadyState};

/// Observable side of a mock transport.
#[derive(Debug)]
pub struct MockShared {
    pub ready: Mutex<ReadyState>,
    pub closes: Mutex<Vec<(u16, Option<String>)>>,
    pub sent: Mutex<Vec<String>>,
}

struct MockTransport(Arc<MockShared>);

impl Transport for MockTransport {
    fn ready_state(&self) -> ReadyState {
        *self.0.ready.lock().unwrap()
    }

    fn send(&self, text: &str) -> Result<(), TransportError> {
        self.0.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn close(&mut self, code: u16, reason: Option<&str>) {
        self.0
            .closes
            .lock()
            .unwrap()
            .push((code, reason.map(str::to_string)));
        *self.0.ready.lock().unwrap() = ReadyState::Closing;
    }
}

/// One transport handed out by the factory.
#[derive(Clone)]
pub struct Created {
    pub url: String,
    pub events: EventSender,
    pub shared: Arc<MockShared>,
}

impl Created {
    /// Simulate a finished handshake.
    pub fn open(&self) {
        *self.shared.ready.lock().unwrap() = ReadyState::Open;
        self.events.opened();
    }

    /// Simulate a dropped connection (1006, unclean).
    pub fn drop_abnormally(&self) {
        *self.shared.ready.lock().unwrap() = ReadyState::Closed;
        self.events.closed(CloseEvent::abnormal());
    }

    pub fn close_with(&self, code: u16, was_clean: bool) {
        *self.shared.ready.lock().unwrap() = ReadyState::Closed;
        self.events.closed(CloseEvent::new(code, "", was_clean));
    }

    pub fn closes(&self) -> Vec<(u16, Option<String>)> {
        self.shared.closes.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct FactoryState {
    created: Vec<Created>,
    fail_with: Option<String>,
}

/// Factory recording every transport it creates.
#[derive(Clone, Default)]
pub struct MockFactory(Arc<Mutex<FactoryState>>);

impl MockFactory {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().created.len()
    }

    pub fn get(&self, index: usize) -> Created {
        self.0.lock().unwrap().created[index].clone()
    }

    pub fn last(&self) -> Created {
        let state = self.0.lock().unwrap();
        state.created.last().cloned().expect("no transport created")
    }

    /// Make every following `create` fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.0.lock().unwrap().fail_with = Some(message.to_string());
    }
}

impl TransportFactory for MockFactory {
    fn create(&self, url: &str, events: EventSender) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.0.lock().unwrap();
        if let Some(message) = &state.fail_with {
            return Err(TransportError::Other(message.clone()));
        }
        let shared = Arc::new(MockShared {
            ready: Mutex::new(ReadyState::Connecting),
            closes: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        });
        state.created.push(Created {
            url: url.to_string(),
            events,
            shared: Arc::clone(&shared),
        });
        Ok(Box::new(MockTransport(shared)))
    }
}

/// Every sink call, in order, as `kind:payload`.
pub type Calls = Arc<Mutex<Vec<String>>>;

pub fn recording_callbacks() -> (Callbacks, Calls) {
    let calls: Calls = Arc::default();
    let push = |calls: &Calls| {
        let calls = Arc::clone(calls);
        move |entry: String| calls.lock().unwrap().push(entry)
    };
    let (log, status, node, done, error) = (
        push(&calls),
        push(&calls),
        push(&calls),
        push(&calls),
        push(&calls),
    );
    let callbacks = Callbacks::new()
        .on_log(move |entry| log(format!("log:{}", entry.message.as_deref().unwrap_or(""))))
        .on_status(move |s| status(format!("status:{s}")))
        .on_node_update(move |id, _| node(format!("node:{id}")))
        .on_completion(move |result| done(format!("completion:{}", result.is_some())))
        .on_error(move |e| error(format!("error:{e}")));
    (callbacks, calls)
}

pub fn snapshot(calls: &Calls) -> Vec<String> {
    calls.lock().unwrap().clone()
}
