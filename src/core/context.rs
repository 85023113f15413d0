//! Per-call cancellation and deadlines.

use crate::core::error::CancelReason;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope of a single call.
///
/// Every wait point of a call (backoff sleep, rate-limit admission, the
/// transport itself, body reads) is raced against this context. Once it fires
/// no further attempts are made and the call fails with
/// [`ApiError::Cancelled`](crate::ApiError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never fires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing token, so several calls can be cancelled together.
    #[must_use]
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Fires `timeout` from now.
    ///
    /// A timeout too large to be represented as a point in time sets no
    /// deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Fires at `deadline`. An earlier deadline already set is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// The cancellation token of this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline of this context, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels every call running under this context (and its clones).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the reason this context has fired, if it has.
    pub fn check(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Completes once the context fires.
    pub async fn fired(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                () = self.token.cancelled() => CancelReason::Cancelled,
                () = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Runs `fut` unless the context fires first.
    ///
    /// # Errors
    ///
    /// Returns the reason the context fired if it did so before `fut` completed.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, CancelReason> {
        tokio::select! {
            biased;
            reason = self.fired() => Err(reason),
            out = fut => Ok(out),
        }
    }
}
