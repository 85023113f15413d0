//! Public client surface + builder.
//! Internals are split into `retry` (retry/cache settings), `inflight` (per-key
//! coalescing), `group` (routing across clients) and `constants` (defaults).

mod constants;
mod group;
mod inflight;
mod retry;

pub use constants::POLL_ATTEMPT_CAP;
pub use group::ClientGroup;
pub use retry::{CacheMode, DEFAULT_MAX_ATTEMPTS, RetryConfig};

use crate::core::auth::{Authorizer, NoAuth};
use crate::core::cache::{DEFAULT_EVICTION_INTERVAL, ResponseCache};
use crate::core::context::CallContext;
use crate::core::limit::{GovernorLimiter, RateLimit};
use crate::core::observer::{NoopObserver, TransactionObserver};
use crate::core::request::{ApiRequest, Request, build_uri};
use crate::core::response::{ResponseHead, is_success_status};
use crate::core::transaction::{Collaborators, PreparedRequest, Transaction};
use crate::core::transport::Transport;
use crate::core::{ApiError, Response};
use constants::USER_AGENT;
use inflight::InflightRegistry;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Decides whether a received response counts as a success.
pub type SuccessPredicate = Arc<dyn Fn(&ResponseHead<'_>) -> bool + Send + Sync>;

struct ClientInner {
    name: String,
    base_url: String,
    transport: Arc<dyn Transport>,
    headers: HeaderMap,
    authorizer: Arc<dyn Authorizer>,
    retry: Arc<RetryConfig>,
    is_successful: SuccessPredicate,
    limiter: Option<Arc<dyn RateLimit>>,
    concurrency: Option<Semaphore>,
    cache: ResponseCache,
    observer: Arc<dyn TransactionObserver>,
    inflight: InflightRegistry,
}

/// A client for one HTTP API, with its own retry, caching and authorization logic.
///
/// Cloning is cheap; clones share the cache, the coalescing registry, the rate
/// limiter and the concurrency limit.
///
/// # Example
///
/// ```no_run
/// # use resilient_api::{ApiClient, ApiRequest, Backoff, RetryConfig, RetryPolicy};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() -> Result<(), resilient_api::ApiError> {
/// let client = ApiClient::builder("https://api.example.com")
///     .retry_config(RetryConfig::new(
///         RetryPolicy::retry_idempotents_on([429, 503]),
///         Backoff::exponential(Duration::from_millis(100), Duration::from_secs(5)),
///         4,
///     ))
///     .build()?;
///
/// let res = client.execute(&ApiRequest::get("/status")).await?;
/// println!("{}", res.text());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("name", &self.inner.name)
            .field("base_url", &self.inner.base_url)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a new builder for the API at `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }

    /// The response cache used by cacheable requests.
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Number of cache keys with a fetch currently running or queued.
    pub fn inflight_keys(&self) -> usize {
        self.inner.inflight.len()
    }

    /// Executes `request` with no cancellation or deadline.
    ///
    /// # Errors
    ///
    /// See [`execute_with`](Self::execute_with).
    pub async fn execute<R: Request + ?Sized>(&self, request: &R) -> Result<Response, ApiError> {
        self.execute_with(request, &CallContext::new()).await
    }

    /// Executes `request`, retrying according to the client's [`RetryConfig`].
    ///
    /// Cacheable requests (see [`Request::as_cacheable`]) are served from the
    /// cache when possible; concurrent calls for one cache key share a single
    /// physical execution.
    ///
    /// # Errors
    ///
    /// - [`ApiError::RetriesExhausted`] when the attempt budget runs out.
    /// - [`ApiError::Status`] when the retry policy rejects an unsuccessful response.
    /// - [`ApiError::Cancelled`] when `ctx` fires first.
    /// - [`ApiError::BodyRead`] when a successful response body cannot be read.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, request, ctx), err, fields(client = %self.inner.name))
    )]
    pub async fn execute_with<R: Request + ?Sized>(
        &self,
        request: &R,
        ctx: &CallContext,
    ) -> Result<Response, ApiError> {
        let mode = request
            .as_cacheable()
            .map_or(CacheMode::Bypass, |c| c.cache_mode());
        self.dispatch(request, ctx, mode).await
    }

    /// Issues a plain GET for `path` relative to the base URL.
    ///
    /// # Errors
    ///
    /// See [`execute_with`](Self::execute_with).
    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.execute(&ApiRequest::get(path)).await
    }

    pub(crate) async fn dispatch<R: Request + ?Sized>(
        &self,
        request: &R,
        ctx: &CallContext,
        mode: CacheMode,
    ) -> Result<Response, ApiError> {
        let prepared = self.prepare(request)?;
        let cache = match request.as_cacheable() {
            Some(c) if mode != CacheMode::Bypass => Some((c.cache_key(), c.ttl())),
            _ => None,
        };

        match (cache, mode) {
            (Some((key, ttl)), CacheMode::Use) => self.fetch_coalesced(key, ttl, prepared, ctx).await,
            (Some((key, ttl)), _) => {
                let response = self.run_transaction(prepared, ctx).await?;
                self.inner.cache.set(key, response.clone(), ttl).await;
                Ok(response)
            }
            (None, _) => self.run_transaction(prepared, ctx).await,
        }
    }

    async fn fetch_coalesced(
        &self,
        key: String,
        ttl: Duration,
        prepared: PreparedRequest,
        ctx: &CallContext,
    ) -> Result<Response, ApiError> {
        if let Some(hit) = self.inner.cache.get(&key).await {
            return Ok(hit);
        }

        let slot = self.inner.inflight.slot(&key);
        let _turn = ctx.guard(slot.acquire()).await.map_err(ApiError::Cancelled)?;

        // Another caller may have filled the entry while this one was queued.
        if let Some(hit) = self.inner.cache.get(&key).await {
            return Ok(hit);
        }

        let response = self.run_transaction(prepared, ctx).await?;
        self.inner.cache.set(key, response.clone(), ttl).await;
        Ok(response)
    }

    async fn run_transaction(
        &self,
        prepared: PreparedRequest,
        ctx: &CallContext,
    ) -> Result<Response, ApiError> {
        let _permit = match &self.inner.concurrency {
            Some(semaphore) => ctx
                .guard(semaphore.acquire())
                .await
                .map_err(ApiError::Cancelled)?
                .ok(),
            None => None,
        };

        let inner = &*self.inner;
        let with = Collaborators {
            transport: inner.transport.as_ref(),
            authorizer: inner.authorizer.as_ref(),
            limiter: inner.limiter.as_deref(),
            observer: inner.observer.as_ref(),
            retry: &inner.retry,
            is_successful: inner.is_successful.as_ref(),
        };
        Transaction::new(prepared, with).run(ctx).await
    }

    fn prepare<R: Request + ?Sized>(&self, request: &R) -> Result<PreparedRequest, ApiError> {
        let uri = build_uri(&request.path(), &request.query());
        let url = Url::parse(&format!("{}{uri}", self.inner.base_url))?;

        let mut headers = self.inner.headers.clone();
        let own = request.headers();
        for name in own.keys() {
            headers.remove(name);
        }
        for (name, value) in &own {
            headers.append(name, value.clone());
        }

        Ok(PreparedRequest {
            method: request.method(),
            url,
            headers,
            body: request.body(),
        })
    }

    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        self.inner.retry.backoff.delay(attempt)
    }
}

/* ----------------------- Builder ----------------------- */

/// Builds an [`ApiClient`].
#[must_use]
pub struct ApiClientBuilder {
    base_url: String,
    name: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
    headers: HeaderMap,
    authorizer: Option<Arc<dyn Authorizer>>,
    retry: Option<RetryConfig>,
    is_successful: Option<SuccessPredicate>,
    limiter: Option<Arc<dyn RateLimit>>,
    max_concurrency: Option<usize>,
    cache: Option<ResponseCache>,
    eviction_interval: Option<Duration>,
    observer: Option<Arc<dyn TransactionObserver>>,
    disable_logging: bool,
}

impl ApiClientBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            name: None,
            user_agent: None,
            timeout: None,
            connect_timeout: None,
            http: None,
            transport: None,
            headers: HeaderMap::new(),
            authorizer: None,
            retry: None,
            is_successful: None,
            limiter: None,
            max_concurrency: None,
            cache: None,
            eviction_interval: None,
            observer: None,
            disable_logging: false,
        }
    }

    /// Name used to tag log events. Defaults to the base URL's host.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the User-Agent of the built-in HTTP client.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set a per-attempt timeout on the built-in HTTP client. Default: none.
    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Set a connect timeout on the built-in HTTP client. Default: none.
    pub fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = Some(dur);
        self
    }

    /// Use an already configured `reqwest` client as the transport.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Use a custom transport. Takes precedence over [`http_client`](Self::http_client).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a header sent with every request. Request headers of the same name win.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sign every attempt with `authorizer`.
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Set the retry configuration. Default: [`RetryConfig::default`].
    pub fn retry_config(mut self, cfg: RetryConfig) -> Self {
        self.retry = Some(cfg);
        self
    }

    /// Decide which responses are successful. Default: any 2xx status.
    pub fn success_predicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResponseHead<'_>) -> bool + Send + Sync + 'static,
    {
        self.is_successful = Some(Arc::new(f));
        self
    }

    /// Admit physical sends according to `quota`.
    pub fn rate_limit(mut self, quota: governor::Quota) -> Self {
        self.limiter = Some(Arc::new(GovernorLimiter::new(quota)));
        self
    }

    /// Use a custom rate limiter.
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Run at most `n` transactions at a time. Default: unlimited.
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n.max(1));
        self
    }

    /// Use (and possibly share) an existing cache.
    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sweep interval of the cache created by [`build`](Self::build). Default: one hour.
    pub fn eviction_interval(mut self, every: Duration) -> Self {
        self.eviction_interval = Some(every);
        self
    }

    /// Receive transaction state transitions.
    pub fn observer(mut self, observer: Arc<dyn TransactionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Do not emit transaction logs.
    pub fn disable_logging(mut self) -> Self {
        self.disable_logging = true;
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or has no host, or if the
    /// built-in HTTP client cannot be constructed.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let parsed = Url::parse(&self.base_url)?;
        let host = match parsed.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(ApiError::InvalidBaseUrl(self.base_url)),
        };
        let base_url = self.base_url.trim_end_matches('/').to_string();
        let name = self.name.unwrap_or_else(|| host.clone());

        let transport: Arc<dyn Transport> = match (self.transport, self.http) {
            (Some(transport), _) => transport,
            (None, Some(http)) => Arc::new(http),
            (None, None) => {
                let mut httpb = reqwest::Client::builder()
                    .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT));
                if let Some(t) = self.timeout {
                    httpb = httpb.timeout(t);
                }
                if let Some(ct) = self.connect_timeout {
                    httpb = httpb.connect_timeout(ct);
                }
                Arc::new(httpb.build()?)
            }
        };

        let observer: Arc<dyn TransactionObserver> = match self.observer {
            _ if self.disable_logging => Arc::new(NoopObserver),
            Some(observer) => observer,
            #[cfg(feature = "tracing")]
            None => Arc::new(crate::core::observer::TracingObserver::new(&name, &host)),
            #[cfg(not(feature = "tracing"))]
            None => Arc::new(NoopObserver),
        };

        let cache = self.cache.unwrap_or_else(|| {
            ResponseCache::with_eviction_interval(
                self.eviction_interval.unwrap_or(DEFAULT_EVICTION_INTERVAL),
            )
        });

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                name,
                base_url,
                transport,
                headers: self.headers,
                authorizer: self.authorizer.unwrap_or_else(|| Arc::new(NoAuth)),
                retry: Arc::new(self.retry.unwrap_or_default()),
                is_successful: self
                    .is_successful
                    .unwrap_or_else(|| Arc::new(is_success_status)),
                limiter: self.limiter,
                concurrency: self.max_concurrency.map(Semaphore::new),
                cache,
                observer,
                inflight: InflightRegistry::default(),
            }),
        })
    }
}
