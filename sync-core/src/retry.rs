//! Bounded retry policy for bootstrap steps.

use std::time::Duration;

/// Upper bound on a single backoff delay.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Bounded exponential backoff.
///
/// Attempt `n` (1-based) waits `base * 2^(n-1)`, capped at 30 seconds, plus
/// up to 50% random jitter when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Whether to add random jitter.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a policy with jitter enabled.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: true,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Disable jitter (deterministic delays).
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Whether another attempt is allowed after `attempt` failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(MAX_DELAY);

        if self.jitter && !base.is_zero() {
            let max_jitter_ms = (base.as_millis() / 2) as u64;
            base + Duration::from_millis(random_jitter_ms(max_jitter_ms))
        } else {
            base
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

/// Generate random jitter between 0 and `max` milliseconds.
fn random_jitter_ms(max: u64) -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes) % (max + 1),
        Err(_) => 0,
    }
}
