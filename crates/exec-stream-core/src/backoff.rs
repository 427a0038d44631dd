//! Reconnection delay policies.
//!
//! Every strategy returns delays inside `[MIN_DELAY, MAX_DELAY]`, so the
//! connection manager can swap policies without re-checking bounds.

use std::time::Duration;

use crate::validation::sanitize_delay;

/// Policy deciding how long to wait before a reconnect and whether to try.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before reconnect number `attempt` (1-based).
    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration;

    /// Whether another attempt is allowed.
    fn should_reconnect(&self, attempt: u32, max_attempts: u32) -> bool {
        max_attempts >= 1 && attempt < max_attempts
    }
}

/// `base * 2^(attempt - 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBackoff;

impl ReconnectionStrategy for ExponentialBackoff {
    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration {
        if attempt < 1 {
            return sanitize_delay(base_delay);
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        sanitize_delay(base_delay.saturating_mul(factor))
    }
}

/// `base * attempt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearBackoff;

impl ReconnectionStrategy for LinearBackoff {
    fn calculate_delay(&self, attempt: u32, base_delay: Duration) -> Duration {
        if attempt < 1 {
            return sanitize_delay(base_delay);
        }
        sanitize_delay(base_delay.saturating_mul(attempt))
    }
}

/// Always `base`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDelay;

impl ReconnectionStrategy for FixedDelay {
    fn calculate_delay(&self, _attempt: u32, base_delay: Duration) -> Duration {
        sanitize_delay(base_delay)
    }
}
