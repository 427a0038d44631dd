//! Ready-state, closure and delay classification.

use std::{fmt, time::Duration};

/// The only close code treated as a normal shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close code reported when the peer sent no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Lower bound for any reconnect delay.
pub const MIN_DELAY: Duration = Duration::from_millis(1);
/// Upper bound for any reconnect delay.
pub const MAX_DELAY: Duration = Duration::from_millis(60_000);

const NO_REASON: &str = "No reason provided";

/// Ready state of a transport, numbered like the browser `WebSocket` API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    /// Decode a raw ready-state value.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }

    /// Upper-case name used in log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closing => "CLOSING",
            Self::Closed => "CLOSED",
        }
    }

    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a raw ready-state value, `UNKNOWN` when out of range.
#[must_use]
pub const fn ready_state_text(raw: u8) -> &'static str {
    match ReadyState::from_raw(raw) {
        Some(state) => state.as_str(),
        None => "UNKNOWN",
    }
}

/// Closure of a transport as observed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseEvent {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// Connection dropped without a closing handshake.
    #[must_use]
    pub fn abnormal() -> Self {
        Self::new(ABNORMAL_CLOSURE, "", false)
    }

    /// Clean shutdown with the normal code. Both conditions are required.
    #[must_use]
    pub const fn is_clean_closure(&self) -> bool {
        self.was_clean && self.code == NORMAL_CLOSURE
    }

    /// The close reason, or a placeholder when the peer gave none.
    #[must_use]
    pub fn reason_or_default(&self) -> &str {
        if self.reason.is_empty() {
            NO_REASON
        } else {
            &self.reason
        }
    }
}

/// Clamp a reconnect delay into `[MIN_DELAY, MAX_DELAY]`.
#[must_use]
pub fn sanitize_delay(delay: Duration) -> Duration {
    delay.clamp(MIN_DELAY, MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_names() {
        assert_eq!(ready_state_text(0), "CONNECTING");
        assert_eq!(ready_state_text(1), "OPEN");
        assert_eq!(ready_state_text(2), "CLOSING");
        assert_eq!(ready_state_text(3), "CLOSED");
        assert_eq!(ready_state_text(4), "UNKNOWN");
        assert_eq!(ready_state_text(ReadyState::Open as u8), "OPEN");
    }

    #[test]
    fn test_only_open_is_open() {
        assert!(ReadyState::Open.is_open());
        assert!(!ReadyState::Connecting.is_open());
        assert!(!ReadyState::Closing.is_open());
        assert!(!ReadyState::Closed.is_open());
    }

    #[test]
    fn test_clean_closure() {
        assert!(CloseEvent::new(NORMAL_CLOSURE, "", true).is_clean_closure());
        assert!(!CloseEvent::new(1001, "", true).is_clean_closure());
        assert!(!CloseEvent::new(NORMAL_CLOSURE, "", false).is_clean_closure());
        assert!(!CloseEvent::abnormal().is_clean_closure());
    }

    #[test]
    fn test_close_reason_fallback() {
        assert_eq!(CloseEvent::new(1000, "done", true).reason_or_default(), "done");
        assert_eq!(
            CloseEvent::new(1000, "", true).reason_or_default(),
            "No reason provided"
        );
    }

    #[test]
    fn test_sanitize_delay_bounds() {
        assert_eq!(sanitize_delay(Duration::ZERO), MIN_DELAY);
        assert_eq!(sanitize_delay(Duration::from_millis(1)), MIN_DELAY);
        assert_eq!(
            sanitize_delay(Duration::from_millis(5000)),
            Duration::from_millis(5000)
        );
        assert_eq!(sanitize_delay(Duration::from_millis(60_000)), MAX_DELAY);
        assert_eq!(sanitize_delay(Duration::from_millis(60_001)), MAX_DELAY);
    }
}
