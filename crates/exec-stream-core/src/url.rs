//! Stream URL construction.

use serde::{Deserialize, Serialize};

/// Host used when no origin (or an origin without a host) is available.
pub const FALLBACK_HOST: &str = "localhost:8000";
/// Path prefix of the execution stream endpoint.
pub const STREAM_PATH: &str = "/ws/executions";

const SECURE_PAGE_PROTOCOL: &str = "https:";
const SECURE_SCHEME: &str = "wss:";
const INSECURE_SCHEME: &str = "ws:";

/// Origin the stream endpoint is served from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Page protocol including the trailing colon, e.g. `https:`.
    #[serde(default)]
    pub protocol: String,
    /// `host[:port]`.
    #[serde(default)]
    pub host: String,
}

impl Origin {
    #[must_use]
    pub fn new(protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
        }
    }

    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.protocol == SECURE_PAGE_PROTOCOL
    }
}

/// Build the stream URL for an execution.
#[must_use]
pub fn build_stream_url(execution_id: &str, origin: Option<&Origin>) -> String {
    let scheme = if origin.is_some_and(Origin::is_secure) {
        SECURE_SCHEME
    } else {
        INSECURE_SCHEME
    };
    let host = origin
        .map(|o| o.host.as_str())
        .filter(|host| !host.is_empty())
        .unwrap_or(FALLBACK_HOST);

    format!("{scheme}//{host}{STREAM_PATH}/{execution_id}")
}
