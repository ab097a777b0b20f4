//! Rate-limit classification
//!
//! Backends and model providers signal throttling in free text. A failure is
//! treated as rate limiting when its message carries one of the known markers;
//! a `retry_delay { seconds: N }` token, when present, is the provider's
//! suggested wait.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Lowercase substrings that mark a throttling failure
pub const RATE_LIMIT_MARKERS: &[&str] = &[
    "quota",
    "rate limit",
    "rate-limit",
    "rate_limit",
    "ratelimit",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
];

static RETRY_DELAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"retry_delay\s*\{\s*seconds:\s*(\d+)\s*\}").expect("static pattern")
});

/// What a throttled failure tells the retry loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHint {
    /// Provider-suggested wait before the next attempt
    pub retry_after: Option<Duration>,
}

impl RateLimitHint {
    /// Hint without a suggested delay
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hint with a suggested delay
    #[inline]
    #[must_use]
    pub fn after(delay: Duration) -> Self {
        Self {
            retry_after: Some(delay),
        }
    }
}

/// Classify a failure message
///
/// Returns `None` unless the message looks like throttling.
#[must_use]
pub fn classify_message(message: &str) -> Option<RateLimitHint> {
    let lower = message.to_lowercase();
    if !RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return None;
    }
    Some(RateLimitHint {
        retry_after: suggested_delay(&lower),
    })
}

/// Extract a `retry_delay { seconds: N }` token
#[must_use]
pub fn suggested_delay(message: &str) -> Option<Duration> {
    RETRY_DELAY
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Errors that can report whether they are throttling
pub trait RateLimitSignal {
    /// `Some` when the failure is rate limiting and should be retried
    fn rate_limit_hint(&self) -> Option<RateLimitHint>;
}

impl RateLimitSignal for anyhow::Error {
    fn rate_limit_hint(&self) -> Option<RateLimitHint> {
        classify_message(&format!("{self:#}"))
    }
}

impl RateLimitSignal for String {
    fn rate_limit_hint(&self) -> Option<RateLimitHint> {
        classify_message(self)
    }
}
