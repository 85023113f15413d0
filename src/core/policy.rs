//! Retry eligibility of received responses.

use crate::core::response::ResponseHead;
use reqwest::Method;
use std::fmt;
use std::sync::Arc;

/// Status codes retried by [`RetryPolicy::default`].
pub const DEFAULT_RETRY_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Decides whether an unsuccessful response may be retried.
///
/// It is only consulted when a response was received. Transport failures are
/// always retried until the attempt budget runs out, whatever the policy says.
/// A request may still not be retried when the policy allows it, for instance
/// when the maximum attempt count is reached.
#[derive(Clone)]
pub enum RetryPolicy {
    /// Retry when the status code is one of the given codes.
    On(Vec<u16>),
    /// Never retry non-idempotent methods; otherwise behave like [`RetryPolicy::On`].
    IdempotentsOn(Vec<u16>),
    /// Any other predicate.
    Custom(Arc<dyn Fn(&ResponseHead<'_>) -> bool + Send + Sync>),
}

impl RetryPolicy {
    /// Retry on the given status codes.
    pub fn retry_on(codes: impl Into<Vec<u16>>) -> Self {
        Self::On(codes.into())
    }

    /// Retry idempotent requests on the given status codes.
    pub fn retry_idempotents_on(codes: impl Into<Vec<u16>>) -> Self {
        Self::IdempotentsOn(codes.into())
    }

    /// Wraps an arbitrary predicate.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ResponseHead<'_>) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Returns `true` if the response may be retried.
    pub fn is_retryable(&self, head: &ResponseHead<'_>) -> bool {
        match self {
            Self::On(codes) => codes.contains(&head.status.as_u16()),
            Self::IdempotentsOn(codes) => {
                is_idempotent(head.method) && codes.contains(&head.status.as_u16())
            }
            Self::Custom(f) => f(head),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::On(DEFAULT_RETRY_CODES.to_vec())
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On(codes) => f.debug_tuple("On").field(codes).finish(),
            Self::IdempotentsOn(codes) => f.debug_tuple("IdempotentsOn").field(codes).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Returns `true` for methods that are safe to repeat: GET, HEAD, PUT and DELETE.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE
    )
}
