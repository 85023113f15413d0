//! Core components of the `resilient-api` client.
//!
//! This module contains the building blocks of the library, including:
//! - The main [`ApiClient`] and its builder.
//! - The transaction state machine that retries a single call.
//! - The [`ResponseCache`](cache::ResponseCache) and per-key request coalescing.
//! - Backoff strategies, retry policies and the async poller.

/// Request signing.
pub mod auth;
/// Wait-duration strategies between attempts.
pub mod backoff;
/// The in-memory response cache.
pub mod cache;
/// The main client (`ApiClient`), builder, and configuration.
pub mod client;
/// Per-call cancellation and deadlines.
pub mod context;
/// The primary error type (`ApiError`) for the crate.
pub mod error;
/// Rate limiting of physical sends.
pub mod limit;
/// Transaction telemetry.
pub mod observer;
/// Retry eligibility of received responses.
pub mod policy;
/// Polling of asynchronous jobs.
pub mod poll;
/// The request model and URI building.
pub mod request;
/// The materialized response.
pub mod response;
/// The transaction state machine.
pub mod transaction;
/// The transport capability.
pub mod transport;

// convenient re-exports so most code can just `use crate::core::ApiClient`
pub use client::{ApiClient, ApiClientBuilder, CacheMode, ClientGroup, RetryConfig};
pub use error::{ApiError, CancelReason, ErrorKind};
pub use response::{Response, ResponseHead};
