use crate::common::{self, Job, ScriptedTransport, Step};
use bytes::Bytes;
use resilient_api::{
    ApiError, Backoff, CallContext, CancelReason, POLL_ATTEMPT_CAP, Response, RetryConfig,
    RetryPolicy,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn job_response(id: &str, body: &'static str) -> Response {
    let url = url::Url::parse(&format!("{}/jobs/{id}", common::BASE_URL)).unwrap();
    Response {
        request_uri: url.path().to_string(),
        url,
        body: Bytes::from_static(body.as_bytes()),
        headers: reqwest::header::HeaderMap::new(),
        duration: Duration::ZERO,
        attempt_count: 1,
        status: 200,
    }
}

#[tokio::test(start_paused = true)]
async fn polls_until_ready_then_fetches_the_result() {
    let transport = ScriptedTransport::new([
        Step::Respond(200, "pending"),
        Step::Respond(200, "pending"),
        Step::Respond(200, "done"),
        Step::Respond(200, "result-1"),
    ]);
    let client = common::scripted_client(transport.clone(), 3);

    let res = client
        .poll_until_ready(&Job::new("1"), &CallContext::new())
        .await
        .unwrap();

    assert_eq!(res.text(), "result-1");
    assert_eq!(res.request_uri, "/jobs/1/result");
    let paths: Vec<String> = transport
        .seen()
        .into_iter()
        .map(|s| s.url.trim_start_matches(common::BASE_URL).to_string())
        .collect();
    assert_eq!(paths, ["/jobs/1", "/jobs/1", "/jobs/1", "/jobs/1/result"]);
}

#[tokio::test(start_paused = true)]
async fn poll_attempt_counter_wraps() {
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let recorded = attempts.clone();
    let backoff = Backoff::custom(move |attempt| {
        recorded.lock().unwrap().push(attempt);
        Duration::from_millis(10)
    });

    let mut steps = vec![Step::Respond(200, "pending"); 7];
    steps.push(Step::Respond(200, "done"));
    steps.push(Step::Respond(200, "result"));
    let transport = ScriptedTransport::new(steps);
    let client = common::scripted_builder(transport.clone())
        .retry_config(RetryConfig::new(RetryPolicy::default(), backoff, 3))
        .build()
        .unwrap();

    client
        .poll_until_ready(&Job::new("1"), &CallContext::new())
        .await
        .unwrap();

    assert_eq!(POLL_ATTEMPT_CAP, 5);
    assert_eq!(*attempts.lock().unwrap(), [1, 2, 3, 4, 5, 1, 2]);
    assert_eq!(transport.calls(), 9);
}

#[tokio::test]
async fn readiness_error_ends_the_chain() {
    let transport = ScriptedTransport::new([Step::Respond(200, "exploded")]);
    let client = common::scripted_client(transport.clone(), 3);

    let err = client
        .poll_until_ready(&Job::new("1"), &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Readiness(ref msg) if msg.contains("exploded")));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn failed_poll_ends_the_chain() {
    let transport = ScriptedTransport::new([Step::Respond(404, "no such job")]);
    let client = common::scripted_client(transport.clone(), 3);

    let err = client
        .poll_until_ready(&Job::new("1"), &CallContext::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn failed_follow_up_is_reported() {
    let transport = ScriptedTransport::new([Step::Respond(200, "done"), Step::Respond(410, "gone")]);
    let client = common::scripted_client(transport.clone(), 3);

    let err = client
        .poll_until_ready(&Job::new("1"), &CallContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 410, .. }));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn ready_cached_poll_skips_the_network() {
    let transport = ScriptedTransport::new([Step::Respond(200, "result")]);
    let client = common::scripted_client(transport.clone(), 3);
    client
        .cache()
        .set("job-1", job_response("1", "done"), Duration::from_secs(60))
        .await;

    let res = client
        .poll_until_ready(&Job::cached("1", Duration::from_secs(60)), &CallContext::new())
        .await
        .unwrap();

    assert_eq!(res.text(), "result");
    assert_eq!(transport.calls(), 1);
    assert!(transport.seen()[0].url.ends_with("/jobs/1/result"));
}

#[tokio::test(start_paused = true)]
async fn stale_cached_poll_is_refreshed_from_the_network() {
    let transport = ScriptedTransport::new([
        Step::Respond(200, "pending"),
        Step::Respond(200, "done"),
        Step::Respond(200, "result"),
    ]);
    let client = common::scripted_client(transport.clone(), 3);
    client
        .cache()
        .set("job-1", job_response("1", "pending"), Duration::from_secs(60))
        .await;

    let res = client
        .poll_until_ready(&Job::cached("1", Duration::from_secs(60)), &CallContext::new())
        .await
        .unwrap();

    assert_eq!(res.text(), "result");
    assert_eq!(transport.calls(), 3);
    let cached = client.cache().get("job-1").await.unwrap();
    assert_eq!(cached.text(), "done");
}

#[tokio::test(start_paused = true)]
async fn deadline_interrupts_the_poll_wait() {
    let transport = ScriptedTransport::new([Step::Respond(200, "pending")]);
    let client = common::scripted_builder(transport.clone())
        .retry_config(RetryConfig::new(
            RetryPolicy::default(),
            Backoff::Fixed(Duration::from_secs(60)),
            3,
        ))
        .build()
        .unwrap();

    let ctx = CallContext::new().with_timeout(Duration::from_secs(1));
    let err = client
        .poll_until_ready(&Job::new("1"), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Cancelled(CancelReason::DeadlineExceeded)));
    assert_eq!(transport.calls(), 1);
}
