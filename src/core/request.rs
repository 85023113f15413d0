//! The request model: a base capability plus optional cache and poll capabilities.

use crate::core::client::CacheMode;
use crate::core::{ApiError, Response};
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::time::Duration;

/// Anything that can be turned into an HTTP request against a client's base URL.
///
/// Optional capabilities are discovered through the `as_*` queries rather
/// than through separate entry points.
pub trait Request: Send + Sync {
    fn method(&self) -> Method;

    /// Path relative to the client's base URL.
    fn path(&self) -> String;

    /// Query parameters. Parameters set once to an empty value are dropped.
    fn query(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Request body. It is buffered so every attempt can resend it from the start.
    fn body(&self) -> Option<Bytes> {
        None
    }

    /// Headers added on top of the client's defaults.
    fn headers(&self) -> HeaderMap {
        HeaderMap::new()
    }

    /// Returns the cache capability of this request, if it has one.
    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        None
    }
}

/// Capability of requests whose successful responses may be memoized.
pub trait Cacheable: Send + Sync {
    /// Key under which the response is stored and in-flight fetches coalesce.
    fn cache_key(&self) -> String;

    /// How long a stored response stays valid.
    fn ttl(&self) -> Duration;

    fn cache_mode(&self) -> CacheMode {
        CacheMode::Use
    }
}

/// A request that starts an asynchronous job and is polled until the job is ready.
pub trait Pollable: Request {
    /// Decides from a poll response whether the job has finished.
    ///
    /// # Errors
    ///
    /// An error aborts this poll chain and is reported for it.
    fn is_ready(&self, response: &Response) -> Result<bool, ApiError>;

    /// Builds the request that fetches the job's result, given the ready poll response.
    fn on_ready(&self, response: &Response) -> Box<dyn Request>;
}

/// Builds the path and query part of a request URI.
///
/// Surrounding whitespace and slashes are trimmed from `path`, a leading `/` is
/// added, parameters whose only value is empty are dropped, and parameters are
/// encoded sorted by key. No `?` is emitted when nothing remains.
pub fn build_uri(path: &str, query: &[(String, String)]) -> String {
    let path = path.trim().trim_matches('/');
    let mut kept: Vec<&(String, String)> = query
        .iter()
        .filter(|(key, value)| {
            !value.is_empty() || query.iter().filter(|(k, _)| k == key).count() > 1
        })
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    if kept.is_empty() {
        return format!("/{path}");
    }
    let mut encoded = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in kept {
        encoded.append_pair(key, value);
    }
    format!("/{path}?{}", encoded.finish())
}

#[derive(Debug, Clone)]
struct CacheSettings {
    key: Option<String>,
    ttl: Duration,
    mode: CacheMode,
}

/// A general purpose [`Request`] built fluently.
///
/// # Example
///
/// ```no_run
/// # use resilient_api::{ApiClient, ApiRequest};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() -> Result<(), resilient_api::ApiError> {
/// let client = ApiClient::builder("https://api.example.com").build()?;
/// let req = ApiRequest::get("/v1/items")
///     .query("page", "2")
///     .cache_for(Duration::from_secs(60));
/// let res = client.execute(&req).await?;
/// println!("{} after {} attempt(s)", res.status, res.attempt_count);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Bytes>,
    cache: Option<CacheSettings>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            cache: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON body and sets the content type.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Json`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ApiError> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Caches successful responses under `key` for `ttl`.
    #[must_use]
    pub fn cache(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        let mode = self.cache.as_ref().map_or(CacheMode::Use, |c| c.mode);
        self.cache = Some(CacheSettings {
            key: Some(key.into()),
            ttl,
            mode,
        });
        self
    }

    /// Caches successful responses for `ttl`, keyed by method and URI.
    #[must_use]
    pub fn cache_for(mut self, ttl: Duration) -> Self {
        let mode = self.cache.as_ref().map_or(CacheMode::Use, |c| c.mode);
        self.cache = Some(CacheSettings {
            key: None,
            ttl,
            mode,
        });
        self
    }

    /// Overrides how the cache is used. Has no effect unless caching is enabled.
    #[must_use]
    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        if let Some(cache) = self.cache.as_mut() {
            cache.mode = mode;
        }
        self
    }
}

impl Request for ApiRequest {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn query(&self) -> Vec<(String, String)> {
        self.query.clone()
    }

    fn body(&self) -> Option<Bytes> {
        self.body.clone()
    }

    fn headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        self.cache.as_ref().map(|_| self as &dyn Cacheable)
    }
}

impl Cacheable for ApiRequest {
    fn cache_key(&self) -> String {
        match self.cache.as_ref().and_then(|c| c.key.clone()) {
            Some(key) => key,
            None => format!("{} {}", self.method, build_uri(&self.path, &self.query)),
        }
    }

    fn ttl(&self) -> Duration {
        self.cache.as_ref().map_or(Duration::ZERO, |c| c.ttl)
    }

    fn cache_mode(&self) -> CacheMode {
        self.cache.as_ref().map_or(CacheMode::Bypass, |c| c.mode)
    }
}
