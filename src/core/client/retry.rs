use crate::core::backoff::Backoff;
use crate::core::policy::RetryPolicy;

/// Number of attempts made by [`RetryConfig::default`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for the automatic retry mechanism.
///
/// Fixed when the client is built and shared by every transaction it runs.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Decides which unsuccessful responses are retried.
    pub policy: RetryPolicy,
    /// The backoff strategy to use between attempts.
    pub backoff: Backoff,
    /// Total number of physical attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
}

impl RetryConfig {
    pub fn new(policy: RetryPolicy, backoff: Backoff, max_attempts: u32) -> Self {
        Self {
            policy,
            backoff,
            max_attempts,
        }
    }

    /// A configuration that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            backoff: Backoff::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Defines the behavior of the in-memory cache for a cacheable request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Read from the cache if a non-expired entry is present; otherwise fetch from the network
    /// and write the response to the cache. Concurrent fetches of one key are coalesced. (Default)
    #[default]
    Use,
    /// Always fetch from the network, bypassing any cached entry, and write the new response to the cache.
    Refresh,
    /// Always fetch from the network and do not read from or write to the cache.
    Bypass,
}
