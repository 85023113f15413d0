#![allow(dead_code)]

use resilient_api::{
    ApiClient, ApiClientBuilder, ApiError, ApiRequest, Authorizer, Backoff, Cacheable, Pollable,
    RateLimit, Request, Response, RetryConfig, RetryPolicy, TransactionEvent, TransactionObserver,
    TransactionState, Transport, TransportFuture,
};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://api.example.test";

/// What the scripted transport does for one physical attempt.
#[derive(Clone, Debug)]
pub enum Step {
    Respond(u16, &'static str),
    Fail(&'static str),
    /// A 200 whose body yields the given prefix, then breaks off.
    Truncated(&'static str),
}

/// A request as observed by the transport.
#[derive(Clone, Debug)]
pub struct Seen {
    pub method: String,
    pub url: String,
    pub body: Option<Vec<u8>>,
    pub headers: reqwest::header::HeaderMap,
}

/// Plays back a fixed sequence of outcomes; the last one repeats forever.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    latency: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Self::with_latency(steps, Duration::ZERO)
    }

    pub fn with_latency(steps: impl IntoIterator<Item = Step>, latency: Duration) -> Arc<Self> {
        let steps: VecDeque<Step> = steps.into_iter().collect();
        let last = steps.back().cloned().unwrap_or(Step::Respond(200, ""));
        Arc::new(Self {
            steps: Mutex::new(steps),
            last: Mutex::new(last),
            latency,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        match steps.pop_front() {
            Some(step) => {
                *self.last.lock().unwrap() = step.clone();
                step
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: reqwest::Request) -> TransportFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(Seen {
            method: request.method().to_string(),
            url: request.url().to_string(),
            body: request
                .body()
                .and_then(|b| b.as_bytes())
                .map(<[u8]>::to_vec),
            headers: request.headers().clone(),
        });
        let step = self.next_step();
        let latency = self.latency;
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match step {
                Step::Respond(status, body) => Ok(reqwest::Response::from(
                    http::Response::builder()
                        .status(status)
                        .body(body)
                        .unwrap(),
                )),
                Step::Fail(msg) => Err(msg.into()),
                Step::Truncated(prefix) => {
                    let chunks: Vec<Result<bytes::Bytes, std::io::Error>> = vec![
                        Ok(bytes::Bytes::from_static(prefix.as_bytes())),
                        Err(std::io::Error::other("connection reset mid-body")),
                    ];
                    let body = reqwest::Body::wrap_stream(futures::stream::iter(chunks));
                    Ok(reqwest::Response::from(
                        http::Response::builder().status(200).body(body).unwrap(),
                    ))
                }
            }
        })
    }
}

/// Records every transition it is told about.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(TransactionState, u32, Duration)>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<TransactionState> {
        self.events.lock().unwrap().iter().map(|e| e.0).collect()
    }

    pub fn events(&self) -> Vec<(TransactionState, u32, Duration)> {
        self.events.lock().unwrap().clone()
    }
}

impl TransactionObserver for RecordingObserver {
    fn on_transition(&self, event: &TransactionEvent<'_>) {
        self.events
            .lock()
            .unwrap()
            .push((event.state, event.attempt, event.wait));
    }
}

/// Stamps every attempt with an increasing `x-attempt` header.
#[derive(Default)]
pub struct CountingAuthorizer {
    pub calls: AtomicU32,
}

impl Authorizer for CountingAuthorizer {
    fn authorize(&self, request: &mut reqwest::Request) -> Result<(), ApiError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        request
            .headers_mut()
            .insert("x-attempt", n.to_string().parse().unwrap());
        Ok(())
    }
}

/// Admits immediately and counts admissions.
#[derive(Default)]
pub struct CountingLimiter {
    pub admitted: AtomicUsize,
}

impl RateLimit for CountingLimiter {
    fn until_ready(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.admitted.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}

/// Never admits anything.
pub struct ClosedLimiter;

impl RateLimit for ClosedLimiter {
    fn until_ready(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(futures::future::pending())
    }
}

/// Retries the default codes with a fixed, short backoff.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::new(
        RetryPolicy::default(),
        Backoff::Fixed(Duration::from_millis(1)),
        max_attempts,
    )
}

/// A builder wired to `transport` with logging disabled.
pub fn scripted_builder(transport: Arc<ScriptedTransport>) -> ApiClientBuilder {
    ApiClient::builder(BASE_URL)
        .transport(transport)
        .disable_logging()
}

/// A client against `transport` retrying up to `max_attempts` times.
pub fn scripted_client(transport: Arc<ScriptedTransport>, max_attempts: u32) -> ApiClient {
    scripted_builder(transport)
        .retry_config(fast_retry(max_attempts))
        .build()
        .unwrap()
}

/// A client against a mock server.
pub fn mock_client(server: &httpmock::MockServer, retry: RetryConfig) -> ApiClient {
    ApiClient::builder(server.base_url())
        .retry_config(retry)
        .disable_logging()
        .build()
        .unwrap()
}

/// A job polled at `/jobs/{id}` whose result lives at `/jobs/{id}/result`.
///
/// The poll body `done` means ready, `pending` means not yet; anything else is
/// a readiness error.
pub struct Job {
    pub id: &'static str,
    pub ttl: Option<Duration>,
}

impl Job {
    pub fn new(id: &'static str) -> Self {
        Self { id, ttl: None }
    }

    pub fn cached(id: &'static str, ttl: Duration) -> Self {
        Self { id, ttl: Some(ttl) }
    }
}

impl Request for Job {
    fn method(&self) -> reqwest::Method {
        reqwest::Method::GET
    }

    fn path(&self) -> String {
        format!("/jobs/{}", self.id)
    }

    fn as_cacheable(&self) -> Option<&dyn Cacheable> {
        self.ttl.map(|_| self as &dyn Cacheable)
    }
}

impl Cacheable for Job {
    fn cache_key(&self) -> String {
        format!("job-{}", self.id)
    }

    fn ttl(&self) -> Duration {
        self.ttl.unwrap_or_default()
    }
}

impl Pollable for Job {
    fn is_ready(&self, response: &Response) -> Result<bool, ApiError> {
        match response.text().as_ref() {
            "done" => Ok(true),
            "pending" => Ok(false),
            other => Err(ApiError::Readiness(format!("unexpected job state `{other}`"))),
        }
    }

    fn on_ready(&self, _response: &Response) -> Box<dyn Request> {
        Box::new(ApiRequest::get(format!("/jobs/{}/result", self.id)))
    }
}
