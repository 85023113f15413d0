//! Transaction telemetry.

use crate::core::ApiError;
use crate::core::transaction::TransactionState;
use reqwest::Method;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// A snapshot of a transaction taken at a state transition.
#[derive(Debug, Clone, Copy)]
pub struct TransactionEvent<'a> {
    /// Unique id of the transaction.
    pub id: Uuid,
    /// The state just entered.
    pub state: TransactionState,
    pub method: &'a Method,
    pub url: &'a Url,
    /// Physical attempts made so far.
    pub attempt: u32,
    /// The attempt budget.
    pub max_attempts: u32,
    /// Wait scheduled before the next attempt.
    pub wait: Duration,
    /// Status of the last response, if any.
    pub status: Option<u16>,
    /// Time since the transaction started.
    pub elapsed: Duration,
    /// Error of the last attempt, if any.
    pub error: Option<&'a ApiError>,
}

/// Receives a notification at every state transition of every transaction.
///
/// Called from the task running the transaction; implementations must be cheap.
pub trait TransactionObserver: Send + Sync {
    fn on_transition(&self, event: &TransactionEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransactionObserver for NoopObserver {
    fn on_transition(&self, _event: &TransactionEvent<'_>) {}
}

/// Emits one structured `tracing` event per transition.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingObserver {
    client: String,
    host: String,
}

#[cfg(feature = "tracing")]
impl TracingObserver {
    /// Tags every event with the client name and host.
    pub fn new(client: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            host: host.into(),
        }
    }
}

#[cfg(feature = "tracing")]
impl TransactionObserver for TracingObserver {
    fn on_transition(&self, e: &TransactionEvent<'_>) {
        let uri = crate::core::response::request_uri(e.url);
        match e.state {
            TransactionState::Initial => tracing::info!(
                client = %self.client,
                host = %self.host,
                id = %e.id,
                method = %e.method,
                uri = %uri,
                max_retry = e.max_attempts,
                "initialized transaction"
            ),
            TransactionState::Retryable => tracing::warn!(
                client = %self.client,
                host = %self.host,
                id = %e.id,
                attempt = e.attempt,
                backoff = ?e.wait,
                status = ?e.status,
                error = e.error.map(tracing::field::display),
                "retrying transaction"
            ),
            TransactionState::ResponseReady => tracing::info!(
                client = %self.client,
                host = %self.host,
                id = %e.id,
                attempt = e.attempt,
                duration = ?e.elapsed,
                status = ?e.status,
                "successful transaction"
            ),
            TransactionState::Exhausted | TransactionState::Unrecoverable => tracing::error!(
                client = %self.client,
                host = %self.host,
                id = %e.id,
                attempt = e.attempt,
                status = ?e.status,
                error = e.error.map(tracing::field::display),
                "failed transaction"
            ),
            TransactionState::Successful => {}
        }
    }
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
