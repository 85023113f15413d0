//! The attempt / classify / back off / retry loop behind every call.

use crate::core::auth::Authorizer;
use crate::core::client::RetryConfig;
use crate::core::context::CallContext;
use crate::core::error::{BoxError, CancelReason};
use crate::core::limit::RateLimit;
use crate::core::observer::{TransactionEvent, TransactionObserver};
use crate::core::response::{ResponseHead, request_uri};
use crate::core::transport::Transport;
use crate::core::{ApiError, Response};
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

/// Lifecycle of a transaction.
///
/// `Initial` and `Retryable` lead to another attempt; `Successful`,
/// `Exhausted` and `Unrecoverable` are terminal. `ResponseReady` follows
/// `Successful` once the body has been read in full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Initial,
    Retryable,
    Successful,
    Exhausted,
    Unrecoverable,
    ResponseReady,
}

impl TransactionState {
    /// Returns `true` once no further attempt will be made.
    pub fn is_done(self) -> bool {
        matches!(
            self,
            Self::Successful | Self::Exhausted | Self::Unrecoverable | Self::ResponseReady
        )
    }

    /// Returns `true` for the failed terminal states.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Exhausted | Self::Unrecoverable)
    }
}

/// A request with its body buffered, ready to be materialized once per attempt.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl PreparedRequest {
    /// Builds a fresh request whose body starts from the beginning, then signs it.
    fn build(&self, authorizer: &dyn Authorizer) -> Result<reqwest::Request, ApiError> {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(reqwest::Body::from(body.clone()));
        }
        authorizer.authorize(&mut request)?;
        Ok(request)
    }
}

/// Read-only collaborators of a transaction, borrowed from the client.
pub(crate) struct Collaborators<'a> {
    pub(crate) transport: &'a dyn Transport,
    pub(crate) authorizer: &'a dyn Authorizer,
    pub(crate) limiter: Option<&'a dyn RateLimit>,
    pub(crate) observer: &'a dyn TransactionObserver,
    pub(crate) retry: &'a RetryConfig,
    pub(crate) is_successful: &'a (dyn Fn(&ResponseHead<'_>) -> bool + Send + Sync),
}

/// One logical request and its sequence of physical attempts.
///
/// Owned and driven by a single task; never shared.
pub(crate) struct Transaction<'a> {
    id: Uuid,
    request: PreparedRequest,
    with: Collaborators<'a>,
    attempts: u32,
    wait: Duration,
    status: Option<u16>,
    error: Option<ApiError>,
    response: Option<reqwest::Response>,
    state: TransactionState,
    started: Instant,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(request: PreparedRequest, with: Collaborators<'a>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            with,
            attempts: 0,
            wait: Duration::ZERO,
            status: None,
            error: None,
            response: None,
            state: TransactionState::Initial,
            started: Instant::now(),
        }
    }

    /// Drives the transaction to a terminal state and materializes the outcome.
    pub(crate) async fn run(mut self, ctx: &CallContext) -> Result<Response, ApiError> {
        self.notify();
        while !self.state.is_done() {
            self.state = self.attempt(ctx).await;
            if self.state == TransactionState::Retryable {
                self.wait = self.with.retry.backoff.delay(self.attempts);
            }
            self.notify();
        }
        let ended = Instant::now();
        self.finish(ctx, ended).await
    }

    fn max_attempts(&self) -> u32 {
        self.with.retry.max_attempts.max(1)
    }

    async fn attempt(&mut self, ctx: &CallContext) -> TransactionState {
        if let Some(reason) = ctx.check() {
            return self.cancelled(reason);
        }
        if !self.wait.is_zero()
            && let Err(reason) = ctx.guard(tokio::time::sleep(self.wait)).await
        {
            return self.cancelled(reason);
        }
        if let Some(limiter) = self.with.limiter
            && let Err(reason) = ctx.guard(limiter.until_ready()).await
        {
            return self.cancelled(reason);
        }

        self.attempts += 1;
        self.status = None;
        let request = match self.request.build(self.with.authorizer) {
            Ok(request) => request,
            Err(e) => {
                self.error = Some(e);
                return TransactionState::Unrecoverable;
            }
        };

        match ctx.guard(self.with.transport.execute(request)).await {
            Err(reason) => self.cancelled(reason),
            Ok(Err(e)) => self.no_response(e),
            Ok(Ok(response)) => self.received_response(response, ctx).await,
        }
    }

    fn no_response(&mut self, e: BoxError) -> TransactionState {
        if self.attempts >= self.max_attempts() {
            self.error = Some(ApiError::RetriesExhausted {
                attempts: self.attempts,
                status: None,
                body: None,
                source: Some(e),
            });
            return TransactionState::Exhausted;
        }
        self.error = Some(ApiError::Transport(e));
        TransactionState::Retryable
    }

    async fn received_response(
        &mut self,
        response: reqwest::Response,
        ctx: &CallContext,
    ) -> TransactionState {
        let status = response.status();
        self.status = Some(status.as_u16());
        let head = ResponseHead {
            method: &self.request.method,
            url: &self.request.url,
            status,
            headers: response.headers(),
        };
        if (self.with.is_successful)(&head) {
            self.error = None;
            self.response = Some(response);
            return TransactionState::Successful;
        }
        let retryable = self.with.retry.policy.is_retryable(&head);

        // The previous response is fully consumed here, before any further attempt.
        let body = match ctx.guard(response.text()).await {
            Err(reason) => return self.cancelled(reason),
            Ok(text) => text.ok(),
        };

        if !retryable {
            self.error = Some(ApiError::Status {
                status: status.as_u16(),
                url: self.request.url.to_string(),
                body,
            });
            return TransactionState::Unrecoverable;
        }
        if self.attempts >= self.max_attempts() {
            self.error = Some(ApiError::RetriesExhausted {
                attempts: self.attempts,
                status: Some(status.as_u16()),
                body,
                source: None,
            });
            return TransactionState::Exhausted;
        }
        self.error = Some(ApiError::Status {
            status: status.as_u16(),
            url: self.request.url.to_string(),
            body,
        });
        TransactionState::Retryable
    }

    fn cancelled(&mut self, reason: CancelReason) -> TransactionState {
        self.error = Some(ApiError::Cancelled(reason));
        TransactionState::Unrecoverable
    }

    async fn finish(mut self, ctx: &CallContext, ended: Instant) -> Result<Response, ApiError> {
        let raw = match (self.state, self.response.take()) {
            (TransactionState::Successful, Some(raw)) => raw,
            _ => return Err(self.take_error()),
        };

        let headers = raw.headers().clone();
        let status = raw.status().as_u16();
        let body = match ctx.guard(raw.bytes()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(self.fail_after_success(ApiError::BodyRead(e))),
            Err(reason) => return Err(self.fail_after_success(ApiError::Cancelled(reason))),
        };

        let response = Response {
            request_uri: request_uri(&self.request.url),
            url: self.request.url.clone(),
            body,
            headers,
            duration: ended.duration_since(self.started),
            attempt_count: self.attempts,
            status,
        };
        self.state = TransactionState::ResponseReady;
        self.notify();
        Ok(response)
    }

    fn fail_after_success(&mut self, e: ApiError) -> ApiError {
        self.error = Some(e);
        self.state = TransactionState::Unrecoverable;
        self.notify();
        self.take_error()
    }

    fn take_error(&mut self) -> ApiError {
        self.error.take().unwrap_or_else(|| ApiError::RetriesExhausted {
            attempts: self.attempts,
            status: self.status,
            body: None,
            source: None,
        })
    }

    fn notify(&self) {
        self.with.observer.on_transition(&TransactionEvent {
            id: self.id,
            state: self.state,
            method: &self.request.method,
            url: &self.request.url,
            attempt: self.attempts,
            max_attempts: self.max_attempts(),
            wait: self.wait,
            status: self.status,
            elapsed: self.started.elapsed(),
            error: self.error.as_ref(),
        });
    }
}
