// ── Runtime monitor configuration ──
//
// These types describe *how* to reach the monitoring endpoint. They carry
// credential data and retry tuning, but never touch disk -- the CLI (via
// gemba-config) constructs a `MonitorConfig` and hands it in.

use std::sync::Arc;
use std::time::Duration;

use gemba_api::retry::{ExponentialBackoff, FixedDelay, RetryPolicy};
use secrecy::SecretString;
use url::Url;

/// Which retry strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryStrategy {
    /// Constant inter-attempt delay (reference behavior).
    #[default]
    Fixed,
    /// Doubling delay with a cap; spreads reconnection storms.
    Exponential,
}

/// Retry tuning, translated to a [`RetryPolicy`] when the monitor starts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,
    /// Inter-attempt delay (fixed), or the initial delay (exponential).
    pub delay: Duration,
    /// Attempt bound; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Delay cap, used by the exponential strategy only.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            delay: Duration::from_millis(3000),
            max_attempts: Some(10),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn build_policy(&self) -> Arc<dyn RetryPolicy> {
        match self.strategy {
            RetryStrategy::Fixed => Arc::new(FixedDelay {
                delay: self.delay,
                max_attempts: self.max_attempts,
            }),
            RetryStrategy::Exponential => Arc::new(ExponentialBackoff {
                initial_delay: self.delay,
                max_delay: self.max_delay,
                max_attempts: self.max_attempts,
            }),
        }
    }
}

/// Configuration for one monitoring channel.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Server origin (e.g. `https://factory.example.com`); the WebSocket
    /// endpoint and scheme are derived from it.
    pub url: Url,
    /// Optional bearer credential for the WebSocket handshake. The
    /// reference deployment sends none.
    pub auth_token: Option<SecretString>,
    /// Reconnection tuning.
    pub retry: RetryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080"
                .parse()
                .expect("default URL is valid"),
            auth_token: None,
            retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_matches_reference() {
        let retry = RetryConfig::default();
        assert_eq!(retry.strategy, RetryStrategy::Fixed);
        assert_eq!(retry.delay, Duration::from_millis(3000));
        assert_eq!(retry.max_attempts, Some(10));
    }

    #[test]
    fn build_policy_respects_strategy() {
        let fixed = RetryConfig::default().build_policy();
        assert_eq!(fixed.next_delay(1), Some(Duration::from_millis(3000)));
        assert_eq!(fixed.next_delay(10), None);

        let exp = RetryConfig {
            strategy: RetryStrategy::Exponential,
            delay: Duration::from_secs(1),
            max_attempts: None,
            max_delay: Duration::from_secs(30),
        }
        .build_policy();
        assert!(exp.next_delay(3) > exp.next_delay(1));
    }
}
