//! Stream client configuration.
//!
//! Loaded from environment variables with the `EXEC_STREAM` prefix; nested
//! values use `__` as separator:
//!
//! - `EXEC_STREAM__MAX_RECONNECT_ATTEMPTS=5`
//! - `EXEC_STREAM__BASE_DELAY_MS=1000`
//! - `EXEC_STREAM__ORIGIN__PROTOCOL=https:`
//! - `EXEC_STREAM__ORIGIN__HOST=example.com`

use std::time::Duration;

use exec_stream_core::{
    Origin,
    validation::{MAX_DELAY, MIN_DELAY},
};
use serde::Deserialize;

/// Default retry budget.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default base reconnect delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

const ENV_PREFIX: &str = "EXEC_STREAM";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Reconnect policy and endpoint origin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Reconnects allowed after unexpected closures.
    pub max_reconnect_attempts: u32,
    /// Base delay fed to the reconnection strategy.
    pub base_delay_ms: u64,
    /// Origin of the stream endpoint; a local fallback is used when unset.
    pub origin: Option<Origin>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            origin: None,
        }
    }
}

impl StreamConfig {
    /// Load configuration from the environment (and `.env` if present).
    ///
    /// # Errors
    /// Returns error if a variable cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_with_prefix(ENV_PREFIX)
    }

    pub(crate) fn load_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns error if the retry budget is zero or the base delay is out
    /// of the reconnect delay bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_reconnect_attempts == 0 {
            return Err(ConfigError::Invalid("max_reconnect_attempts must be at least 1"));
        }
        let base = self.base_delay();
        if base < MIN_DELAY || base > MAX_DELAY {
            return Err(ConfigError::Invalid("base_delay_ms must be within 1..=60000"));
        }
        Ok(())
    }

    /// Base delay as a `Duration`.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_base_delay_ms(mut self, millis: u64) -> Self {
        self.base_delay_ms = millis;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }
}
