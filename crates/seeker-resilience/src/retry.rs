//! Retry with exponential backoff for rate-limited operations
//!
//! Only failures classified as rate limiting are retried. Anything else is
//! returned to the caller on the attempt that produced it.

use crate::classify::RateLimitSignal;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Starting delay when the configuration leaves it unset
pub const DEFAULT_INITIAL_DELAY_SECS: f64 = 1.0;

/// Jitter scales each wait by a factor drawn from `[1 - JITTER, 1 + JITTER]`
pub const JITTER: f64 = 0.15;

const MAX_LOGGED_ERROR_CHARS: usize = 200;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Starting delay in seconds (1s when unset)
    pub initial_delay_secs: Option<f64>,
    /// Ceiling for any single wait, in seconds
    pub max_delay_secs: f64,
    /// Multiplier applied to the delay after each throttled attempt
    pub backoff_factor: f64,
    /// Randomize waits by ±15%
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_secs: None,
            max_delay_secs: 600.0,
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Preset for calls to external intelligence providers
    #[must_use]
    pub fn intel_fetch() -> Self {
        Self {
            max_retries: 5,
            initial_delay_secs: Some(20.0),
            max_delay_secs: 300.0,
            ..Self::default()
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// With retry count
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With starting delay
    #[inline]
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_secs = Some(delay.as_secs_f64());
        self
    }

    /// With delay ceiling
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_secs = delay.as_secs_f64();
        self
    }

    /// With backoff multiplier
    #[inline]
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Enable or disable jitter
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Starting delay
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        secs(self.initial_delay_secs.unwrap_or(DEFAULT_INITIAL_DELAY_SECS))
    }

    /// Delay ceiling
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        secs(self.max_delay_secs)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// A description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(format!("backoff_factor must be >= 1.0, got {}", self.backoff_factor));
        }
        if !self.max_delay_secs.is_finite() || self.max_delay_secs < 0.0 {
            return Err(format!("max_delay_secs must be >= 0, got {}", self.max_delay_secs));
        }
        if let Some(initial) = self.initial_delay_secs {
            if !initial.is_finite() || initial < 0.0 {
                return Err(format!("initial_delay_secs must be >= 0, got {initial}"));
            }
        }
        Ok(())
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Executes operations under a [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create new policy
    #[inline]
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds, fails without throttling, or runs out of retries
    ///
    /// The operation is attempted at most `max_retries + 1` times. Between
    /// throttled attempts the policy waits either the provider's suggested delay
    /// or the previous delay times `backoff_factor`, capped at `max_delay`,
    /// optionally jittered. Waits are `tokio::time::sleep`, so sibling tasks keep running.
    ///
    /// # Errors
    /// The error from the final attempt.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RateLimitSignal + Display,
    {
        let max_delay = self.config.max_delay();
        let mut delay = self.config.initial_delay();
        let mut attempt: u32 = 0;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(hint) = err.rate_limit_hint() else {
                return Err(err);
            };

            if attempt >= self.config.max_retries {
                tracing::warn!(
                    attempts = attempt + 1,
                    error = %truncate(&err.to_string()),
                    "Rate limit retries exhausted"
                );
                return Err(err);
            }

            delay = match hint.retry_after {
                Some(suggested) => suggested.min(max_delay),
                None => next_delay(delay, self.config.backoff_factor, max_delay),
            };
            let wait = if self.config.jitter { jittered(delay) } else { delay };

            attempt += 1;
            tracing::warn!(
                attempt,
                max_retries = self.config.max_retries,
                delay_secs = wait.as_secs_f64(),
                error = %truncate(&err.to_string()),
                "Rate limited, backing off"
            );

            tokio::time::sleep(wait).await;
        }
    }
}

/// Next exponential delay, capped
#[must_use]
pub fn next_delay(current: Duration, factor: f64, max: Duration) -> Duration {
    Duration::try_from_secs_f64(current.as_secs_f64() * factor)
        .unwrap_or(max)
        .min(max)
}

fn jittered(delay: Duration) -> Duration {
    let factor = rand::rng().random_range((1.0 - JITTER)..=(1.0 + JITTER));
    delay.mul_f64(factor)
}

fn truncate(message: &str) -> &str {
    match message.char_indices().nth(MAX_LOGGED_ERROR_CHARS) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RateLimitHint;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[derive(Debug)]
    enum TestError {
        Throttled(Option<u64>),
        Broken,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Throttled(_) => f.write_str("throttled"),
                Self::Broken => f.write_str("broken"),
            }
        }
    }

    impl RateLimitSignal for TestError {
        fn rate_limit_hint(&self) -> Option<RateLimitHint> {
            match self {
                Self::Throttled(Some(s)) => Some(RateLimitHint::after(Duration::from_secs(*s))),
                Self::Throttled(None) => Some(RateLimitHint::new()),
                Self::Broken => None,
            }
        }
    }

    fn assert_elapsed(start: Instant, expected: Duration) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(50),
            "elapsed {elapsed:?}, expected {expected:?}"
        );
    }

    fn quiet(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(RetryConfig::default().with_max_retries(max_retries).with_jitter(false))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_rate_limits() {
        let calls = AtomicUsize::new(0);
        let result = quiet(5)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TestError::Throttled(None))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = quiet(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Broken) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Broken)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn respects_max_retries() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = quiet(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Throttled(None)) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Throttled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(RetryConfig::no_retry());
        let result: Result<(), _> = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Throttled(None)) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_waits_without_jitter() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();
        let _ = quiet(5)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(TestError::Throttled(None))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        // 1s start: waits of 2s, 4s, 8s
        assert_elapsed(start, Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_delay_overrides_backoff() {
        let calls = AtomicUsize::new(0);
        let start = Instant::now();
        let _ = quiet(5)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(TestError::Throttled(Some(7)))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_elapsed(start, Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_are_capped() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_initial_delay(Duration::from_secs(10))
                .with_max_delay(Duration::from_secs(15))
                .with_jitter(false),
        );
        let calls = AtomicUsize::new(0);
        let start = Instant::now();
        let _ = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    match n {
                        0 => Err(TestError::Throttled(Some(3600))),
                        1 => Err(TestError::Throttled(None)),
                        _ => Ok(()),
                    }
                }
            })
            .await;

        // provider delay capped to 15s, then 15s * 2 capped to 15s
        assert_elapsed(start, Duration::from_secs(30));
    }

    #[test]
    fn presets() {
        let intel = RetryConfig::intel_fetch();
        assert_eq!(intel.initial_delay(), Duration::from_secs(20));
        assert_eq!(intel.max_delay(), Duration::from_secs(300));
        assert_eq!(RetryConfig::default().initial_delay(), Duration::from_secs(1));
        assert_eq!(RetryConfig::default().max_delay(), Duration::from_secs(600));
    }

    #[test]
    fn validate_rejects_bad_factor() {
        assert!(RetryConfig::default().with_backoff_factor(0.5).validate().is_err());
        assert!(RetryConfig::default().with_backoff_factor(f64::NAN).validate().is_err());
        assert!(RetryConfig::default().validate().is_ok());
    }

    #[test]
    fn truncate_keeps_short_messages() {
        assert_eq!(truncate("short"), "short");
        let long = "x".repeat(500);
        assert_eq!(truncate(&long).len(), MAX_LOGGED_ERROR_CHARS);
    }

    proptest! {
        #[test]
        fn jitter_stays_in_band(ms in 1u64..1_000_000) {
            let delay = Duration::from_millis(ms);
            let wait = jittered(delay).as_secs_f64();
            let base = delay.as_secs_f64();
            prop_assert!(wait >= base * (1.0 - JITTER) - 1e-9);
            prop_assert!(wait <= base * (1.0 + JITTER) + 1e-9);
        }

        #[test]
        fn next_delay_never_exceeds_max(ms in 0u64..10_000_000, factor in 1.0f64..10.0) {
            let max = Duration::from_secs(600);
            prop_assert!(next_delay(Duration::from_millis(ms), factor, max) <= max);
        }
    }
}
