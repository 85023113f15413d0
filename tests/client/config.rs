use crate::common::{self, ScriptedTransport, Step};
use resilient_api::{
    ApiClient, ApiError, ApiRequest, Backoff, DEFAULT_MAX_ATTEMPTS, Quota, RetryConfig, RetryPolicy,
};
use std::num::NonZeroU32;
use std::time::Duration;

#[test]
fn base_url_without_host_is_rejected() {
    let err = ApiClient::builder("unix:/var/run/api.sock").build().unwrap_err();
    assert!(matches!(err, ApiError::InvalidBaseUrl(_)), "{err:?}");

    let err = ApiClient::builder("not a url").build().unwrap_err();
    assert!(matches!(err, ApiError::Url(_)), "{err:?}");
}

#[tokio::test]
async fn builder_defaults() {
    let client = ApiClient::builder("https://api.example.com/v2/")
        .build()
        .unwrap();

    assert_eq!(client.base_url(), "https://api.example.com/v2");
    assert_eq!(client.name(), "api.example.com");
    assert_eq!(client.retry_config().max_attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(client.retry_config().max_attempts, 5);
    assert!(matches!(client.retry_config().policy, RetryPolicy::On(ref codes) if codes == &[429, 500, 502, 503, 504]));
    assert_eq!(client.retry_config().backoff.delay(0), Duration::from_secs(1));
    assert_eq!(client.retry_config().backoff.delay(10), Duration::from_secs(30));
    assert_eq!(client.cache().eviction_interval(), Duration::from_secs(3600));
    assert_eq!(client.inflight_keys(), 0);
}

#[tokio::test]
async fn builder_overrides() {
    let client = ApiClient::builder("https://api.example.com")
        .name("billing")
        .eviction_interval(Duration::from_secs(30))
        .retry_config(RetryConfig::new(
            RetryPolicy::retry_idempotents_on([503]),
            Backoff::linear(Duration::from_millis(250)),
            2,
        ))
        .build()
        .unwrap();

    assert_eq!(client.name(), "billing");
    assert_eq!(client.cache().eviction_interval(), Duration::from_secs(30));
    assert_eq!(client.retry_config().max_attempts, 2);
    assert_eq!(
        client.retry_config().backoff.delay(2),
        Duration::from_millis(500)
    );
}

#[tokio::test]
async fn paths_are_joined_to_the_base_path() {
    let transport = ScriptedTransport::new([Step::Respond(200, "ok")]);
    let client = ApiClient::builder("https://api.example.com/v2/")
        .transport(transport.clone())
        .disable_logging()
        .build()
        .unwrap();

    client
        .execute(&ApiRequest::get(" /accounts/7/ ").query("expand", "owner"))
        .await
        .unwrap();

    assert_eq!(
        transport.seen()[0].url,
        "https://api.example.com/v2/accounts/7?expand=owner"
    );
}

#[tokio::test(start_paused = true)]
async fn max_concurrency_serializes_transactions() {
    let transport =
        ScriptedTransport::with_latency([Step::Respond(200, "ok")], Duration::from_secs(1));
    let client = common::scripted_builder(transport.clone())
        .max_concurrency(1)
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    let (a, b) = tokio::join!(client.get("/v1/a"), client.get("/v1/b"));

    assert!(a.is_ok() && b.is_ok());
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn governor_quota_admits_a_burst() {
    let transport = ScriptedTransport::new([Step::Respond(200, "ok")]);
    let quota = Quota::per_second(NonZeroU32::new(100).unwrap())
        .allow_burst(NonZeroU32::new(3).unwrap());
    let client = common::scripted_builder(transport.clone())
        .rate_limit(quota)
        .build()
        .unwrap();

    for _ in 0..3 {
        client.get("/v1/ping").await.unwrap();
    }

    assert_eq!(transport.calls(), 3);
}
