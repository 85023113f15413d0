//! Admission control before each physical send.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::pin::Pin;

/// Gates physical sends. Awaited once before every attempt.
///
/// Cancellation is handled by the caller, which races the returned future
/// against the call's [`CallContext`](crate::CallContext).
pub trait RateLimit: Send + Sync {
    /// Completes when the next request may be sent.
    fn until_ready(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// A GCRA limiter shared by every call of a client.
#[derive(Debug)]
pub struct GovernorLimiter {
    inner: DefaultDirectRateLimiter,
}

impl GovernorLimiter {
    /// Creates a limiter admitting requests according to `quota`.
    pub fn new(quota: Quota) -> Self {
        Self {
            inner: RateLimiter::direct(quota),
        }
    }
}

impl RateLimit for GovernorLimiter {
    fn until_ready(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.inner.until_ready())
    }
}
