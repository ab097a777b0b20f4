//! Threat-Seeker Resilience
//!
//! Rate-limit aware retries for calls into query backends and intelligence
//! providers. Failures are classified by message, and only throttling is retried.

#![warn(unreachable_pub)]

pub mod classify;
pub mod retry;

pub use classify::{classify_message, RateLimitHint, RateLimitSignal};
pub use retry::{RetryConfig, RetryPolicy};
