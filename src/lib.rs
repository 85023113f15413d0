//! resilient-api: the resilient execution core of an HTTP API client.
//!
//! A logical request becomes one or more physical attempts: the client waits
//! for rate-limit admission, sends, classifies the outcome, backs off and
//! retries until the call succeeds, is rejected, runs out of attempts, or is
//! cancelled. Cacheable requests are memoized with a TTL and concurrent
//! fetches of one key share a single execution. Asynchronous jobs can be
//! polled until ready and their result fetched.
//!
//! ```no_run
//! use resilient_api::{ApiClient, ApiRequest, CallContext};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), resilient_api::ApiError> {
//! let client = ApiClient::builder("https://api.example.com").build()?;
//! let ctx = CallContext::new().with_timeout(Duration::from_secs(10));
//! let res = client
//!     .execute_with(&ApiRequest::get("/v1/report").cache_for(Duration::from_secs(30)), &ctx)
//!     .await?;
//! println!("{} bytes in {:?}", res.body.len(), res.duration);
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::auth::{ApiKey, Authorizer, BasicAuth, BearerToken, KeyLocation, NoAuth};
pub use crate::core::backoff::Backoff;
pub use crate::core::cache::ResponseCache;
pub use crate::core::client::{
    ApiClient, ApiClientBuilder, CacheMode, ClientGroup, DEFAULT_MAX_ATTEMPTS, POLL_ATTEMPT_CAP,
    RetryConfig, SuccessPredicate,
};
pub use crate::core::context::CallContext;
pub use crate::core::error::{ApiError, BoxError, CancelReason, ErrorKind};
pub use crate::core::limit::{GovernorLimiter, RateLimit};
#[cfg(feature = "tracing")]
pub use crate::core::observer::TracingObserver;
#[cfg(feature = "tracing-subscriber")]
pub use crate::core::observer::init_tracing;
pub use crate::core::observer::{NoopObserver, TransactionEvent, TransactionObserver};
pub use crate::core::policy::{RetryPolicy, is_idempotent};
pub use crate::core::poll::AsyncResponse;
pub use crate::core::request::{ApiRequest, Cacheable, Pollable, Request, build_uri};
pub use crate::core::response::{Response, ResponseHead};
pub use crate::core::transaction::TransactionState;
pub use crate::core::transport::{Transport, TransportFuture};

/// Re-exported so rate limits can be expressed without a direct dependency.
pub use governor::Quota;
