//! The capability that performs a single physical HTTP exchange.

use crate::core::error::BoxError;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<reqwest::Response, BoxError>> + Send + 'a>>;

/// Executes a prepared request and returns the raw response or a transport-level failure.
///
/// Connection pooling, TLS and HTTP parsing all live behind this trait. It is
/// implemented for [`reqwest::Client`]; tests and custom stacks can provide
/// their own.
pub trait Transport: Send + Sync {
    /// Sends `request` once. Any status code counts as a received response.
    fn execute(&self, request: reqwest::Request) -> TransportFuture<'_>;
}

impl Transport for reqwest::Client {
    fn execute(&self, request: reqwest::Request) -> TransportFuture<'_> {
        Box::pin(async move { Ok(reqwest::Client::execute(self, request).await?) })
    }
}
