//! WebSocket transport built on tokio-tungstenite.
//!
//! Each transport runs one driver task that owns the socket. The handle
//! returned to the manager only shares the ready state and a command channel.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use exec_stream_core::{
    CloseEvent, ReadyState,
    validation::{NO_STATUS_RECEIVED, NORMAL_CLOSURE, ready_state_text},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

use crate::transport::{EventSender, Transport, TransportError, TransportFactory};

enum Command {
    Send(String),
    Close { code: u16, reason: Option<String> },
}

/// Creates WebSocket transports on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory;

impl TransportFactory for WebSocketFactory {
    fn create(&self, url: &str, events: EventSender) -> Result<Box<dyn Transport>, TransportError> {
        let request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;

        let ready = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        runtime.spawn(drive(request, events, Arc::clone(&ready), commands_rx));

        Ok(Box::new(WebSocketTransport {
            ready,
            commands: commands_tx,
        }))
    }
}

/// Handle to a running WebSocket driver task.
pub struct WebSocketTransport {
    ready: Arc<AtomicU8>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Transport for WebSocketTransport {
    fn ready_state(&self) -> ReadyState {
        let raw = self.ready.load(Ordering::Acquire);
        ReadyState::from_raw(raw).unwrap_or_else(|| {
            tracing::warn!(
                ready_state = ready_state_text(raw),
                raw,
                "Unexpected ready state, treating as closed"
            );
            ReadyState::Closed
        })
    }

    fn send(&self, text: &str) -> Result<(), TransportError> {
        if !self.ready_state().is_open() {
            return Err(TransportError::NotConnected);
        }
        self.commands
            .send(Command::Send(text.to_string()))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self, code: u16, reason: Option<&str>) {
        if matches!(self.ready_state(), ReadyState::Closing | ReadyState::Closed) {
            return;
        }
        self.ready.store(ReadyState::Closing as u8, Ordering::Release);
        let _ = self.commands.send(Command::Close {
            code,
            reason: reason.map(str::to_string),
        });
    }
}

async fn drive(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    events: EventSender,
    ready: Arc<AtomicU8>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let set_state = |state: ReadyState| ready.store(state as u8, Ordering::Release);

    let stream = match connect_async(request).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::error!("WebSocket connect failed: {e}");
            set_state(ReadyState::Closed);
            events.error(Some(e.to_string()));
            events.closed(CloseEvent::abnormal());
            return;
        }
    };

    // Closed before the handshake finished.
    if ready.load(Ordering::Acquire) == ReadyState::Closing as u8 {
        let (mut sink, _) = stream.split();
        let _ = sink.send(Message::Close(None)).await;
        set_state(ReadyState::Closed);
        return;
    }

    set_state(ReadyState::Open);
    events.opened();

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => events.message(text.as_str()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => events.message(text),
                    Err(_) => tracing::warn!("Dropping non UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (NO_STATUS_RECEIVED, String::new()),
                        |f| (u16::from(f.code), f.reason.to_string()),
                    );
                    set_state(ReadyState::Closed);
                    events.closed(CloseEvent::new(code, reason, true));
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!("WebSocket receive failed: {e}");
                    set_state(ReadyState::Closed);
                    events.error(Some(e.to_string()));
                    events.closed(CloseEvent::abnormal());
                    return;
                }
                None => {
                    set_state(ReadyState::Closed);
                    events.closed(CloseEvent::abnormal());
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::error!("WebSocket send failed: {e}");
                    }
                }
                Some(Command::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.unwrap_or_default().into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    set_state(ReadyState::Closed);
                    return;
                }
                None => {
                    let frame = CloseFrame {
                        code: CloseCode::from(NORMAL_CLOSURE),
                        reason: "".into(),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    set_state(ReadyState::Closed);
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ConnectionId, TransportEvent};
    use exec_stream_core::{build_stream_url, Origin};

    #[test]
    fn test_unknown_raw_state_reads_as_closed() {
        let (commands, _rx) = mpsc::unbounded_channel();
        let transport = WebSocketTransport {
            ready: Arc::new(AtomicU8::new(9)),
            commands,
        };
        assert_eq!(transport.ready_state(), ReadyState::Closed);
        assert!(matches!(
            transport.send("ping"),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn test_create_requires_runtime() {
        let (tx, _rx) = EventSender::channel();
        let events = EventSender::new(ConnectionId::new(), tx);
        let result = WebSocketFactory.create("ws://127.0.0.1:1/ws/executions/e", events);
        assert!(matches!(result, Err(TransportError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_secure_origin_attempts_tls_handshake() {
        // Plain TCP peer that hangs up immediately: the TLS handshake fails.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let url = build_stream_url("exec-1", Some(&Origin::new("https:", addr.to_string())));
        assert!(url.starts_with("wss://"));

        let (tx, mut rx) = EventSender::channel();
        let id = ConnectionId::new();
        let transport = WebSocketFactory
            .create(&url, EventSender::new(id, tx))
            .unwrap();

        let (from, event) = rx.recv().await.unwrap();
        assert_eq!(from, id);
        let TransportEvent::Error(Some(message)) = event else {
            panic!("expected an error event, got {event:?}");
        };
        assert!(
            !message.contains("TLS support not compiled in"),
            "wss connect failed before the handshake: {message}"
        );

        let (_, event) = rx.recv().await.unwrap();
        assert_eq!(event, TransportEvent::Close(CloseEvent::abnormal()));
        assert_eq!(transport.ready_state(), ReadyState::Closed);
    }
}
