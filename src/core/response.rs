use crate::core::ApiError;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// The fully materialized result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The URL the request was sent to.
    pub url: Url,
    /// Path and query of the request URL.
    pub request_uri: String,
    /// The complete response body.
    pub body: Bytes,
    /// The response headers.
    pub headers: HeaderMap,
    /// Time between the start of the first attempt and the end of the last one.
    pub duration: Duration,
    /// Number of physical attempts made.
    pub attempt_count: u32,
    /// The HTTP status code.
    pub status: u16,
}

impl Response {
    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Json`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What is known about a response before its body is read.
///
/// Success predicates and retry policies are evaluated against this view.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHead<'a> {
    /// Method of the request that produced the response.
    pub method: &'a Method,
    /// URL of the request that produced the response.
    pub url: &'a Url,
    /// The status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: &'a HeaderMap,
}

/// Default success predicate: any 2xx status.
pub fn is_success_status(head: &ResponseHead<'_>) -> bool {
    head.status.is_success()
}

pub(crate) fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{q}", url.path()),
        None => url.path().to_string(),
    }
}
