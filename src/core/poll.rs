//! Polling asynchronous jobs until they are ready.

use crate::core::client::{ApiClient, CacheMode, POLL_ATTEMPT_CAP};
use crate::core::context::CallContext;
use crate::core::request::Pollable;
use crate::core::{ApiError, Response};
use futures::Stream;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tokio_util::task::AbortOnDropHandle;

/// Outcome of one poll chain submitted to [`ApiClient::execute_async`].
#[derive(Debug)]
pub struct AsyncResponse {
    /// Position of the request in the submitted list.
    pub index: usize,
    /// The follow-up response, or the first error of the chain.
    pub result: Result<Response, ApiError>,
}

impl ApiClient {
    /// Polls every request concurrently, each on its own task.
    ///
    /// The returned stream yields one [`AsyncResponse`] per request in completion
    /// order and ends once all of them have finished. A failing chain does not
    /// affect the others. Dropping the stream aborts the chains still running.
    pub fn execute_async(
        &self,
        ctx: &CallContext,
        requests: Vec<Arc<dyn Pollable>>,
    ) -> impl Stream<Item = AsyncResponse> + Send + Unpin + 'static {
        requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let client = self.clone();
                let ctx = ctx.clone();
                let worker = AbortOnDropHandle::new(tokio::spawn(async move {
                    client.poll_until_ready(&*request, &ctx).await
                }));
                async move {
                    let result = match worker.await {
                        Ok(result) => result,
                        Err(e) => Err(ApiError::Task(e.to_string())),
                    };
                    AsyncResponse { index, result }
                }
            })
            .collect::<FuturesUnordered<_>>()
    }

    /// Repeats `request` until it reports readiness, then runs its follow-up once.
    ///
    /// Between polls the client's backoff is applied with an attempt counter that
    /// wraps back to 1 after [`POLL_ATTEMPT_CAP`] polls. For cacheable polls a
    /// ready response already in the cache short-circuits the network call;
    /// network polls refresh the cached entry.
    ///
    /// # Errors
    ///
    /// Returns the first error of the chain: a failed poll, a failed readiness
    /// check, a cancelled wait, or a failed follow-up.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, request, ctx), err, fields(client = %self.name()))
    )]
    pub async fn poll_until_ready<P: Pollable + ?Sized>(
        &self,
        request: &P,
        ctx: &CallContext,
    ) -> Result<Response, ApiError> {
        let mut attempt = 0u32;
        loop {
            if let Some(cacheable) = request.as_cacheable()
                && cacheable.cache_mode() != CacheMode::Bypass
                && let Some(cached) = self.cache().get(&cacheable.cache_key()).await
                && request.is_ready(&cached)?
            {
                return self.execute_with(request.on_ready(&cached).as_ref(), ctx).await;
            }

            let mode = match request.as_cacheable().map(|c| c.cache_mode()) {
                Some(CacheMode::Bypass) | None => CacheMode::Bypass,
                Some(_) => CacheMode::Refresh,
            };
            let polled = self.dispatch(request, ctx, mode).await?;
            if request.is_ready(&polled)? {
                return self.execute_with(request.on_ready(&polled).as_ref(), ctx).await;
            }

            attempt = if attempt >= POLL_ATTEMPT_CAP {
                1
            } else {
                attempt + 1
            };
            ctx.guard(tokio::time::sleep(self.backoff_delay(attempt)))
                .await
                .map_err(ApiError::Cancelled)?;
        }
    }
}
