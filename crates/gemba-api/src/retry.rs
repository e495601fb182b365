//! Reconnection policy.
//!
//! Pure decision logic: given the number of attempts since the last
//! successful open, decide whether to retry and after how long. The channel
//! owns the counter (increment per failed/closed connection, reset to zero
//! on successful open); policies only map a count to a delay.

use std::time::Duration;

/// Pluggable retry strategy consulted after every failed or closed
/// connection.
///
/// `attempts_since_success` starts at 1 for the first failure after a
/// successful open (or after `start()`). Returning `None` means give up:
/// the channel transitions to its terminal failed state and stops retrying
/// until explicitly restarted.
pub trait RetryPolicy: Send + Sync {
    fn next_delay(&self, attempts_since_success: u32) -> Option<Duration>;
}

// ── FixedDelay ───────────────────────────────────────────────────────

/// Constant inter-attempt delay with a bounded attempt count.
///
/// This is the reference behavior (3000 ms, 10 attempts). A fixed delay
/// against a just-recovered server is a known thundering-herd risk; prefer
/// [`ExponentialBackoff`] when many clients share one server.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    pub delay: Duration,
    /// Maximum attempts before giving up. `None` means retry forever.
    pub max_attempts: Option<u32>,
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(3000),
            max_attempts: Some(10),
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, attempts_since_success: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempts_since_success >= max => None,
            _ => Some(self.delay),
        }
    }
}

// ── ExponentialBackoff ───────────────────────────────────────────────

/// Exponential backoff with deterministic jitter.
///
/// `delay = min(initial * 2^(attempts-1), max_delay) ± 25%`, jitter seeded
/// from the attempt number to spread reconnection storms across clients
/// without pulling in an RNG.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Maximum attempts before giving up. `None` means retry forever.
    pub max_attempts: Option<u32>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempts_since_success: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempts_since_success >= max {
                return None;
            }
        }

        let exponent = attempts_since_success.saturating_sub(1);
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent.min(30) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter_factor = 1.0 + 0.25 * (f64::from(attempts_since_success) * 7.3).sin();
        let with_jitter = (capped * jitter_factor).max(0.0);

        Some(Duration::from_secs_f64(with_jitter))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
