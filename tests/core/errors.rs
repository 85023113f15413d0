use resilient_api::{ApiError, CancelReason, ErrorKind, TransactionState};

#[test]
fn errors_map_onto_kinds() {
    let exhausted = ApiError::RetriesExhausted {
        attempts: 5,
        status: Some(503),
        body: Some("busy".into()),
        source: None,
    };
    assert_eq!(exhausted.kind(), ErrorKind::TransportExhausted);
    assert_eq!(exhausted.status(), Some(503));
    assert_eq!(
        exhausted.to_string(),
        "retry attempts exhausted after 5 attempt(s) (last status 503), error body: busy"
    );

    let status = ApiError::Status {
        status: 404,
        url: "https://api.example.com/x".into(),
        body: None,
    };
    assert_eq!(status.kind(), ErrorKind::UnrecoverableStatus);
    assert_eq!(
        status.to_string(),
        "unexpected status code 404 at https://api.example.com/x"
    );

    let cancelled = ApiError::Cancelled(CancelReason::DeadlineExceeded);
    assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
    assert!(cancelled.is_cancelled());
    assert_eq!(cancelled.status(), None);
    assert_eq!(cancelled.to_string(), "deadline exceeded");

    assert_eq!(ApiError::Auth("nope".into()).kind(), ErrorKind::Other);
}

#[test]
fn exhausted_transport_failure_keeps_its_source() {
    let err = ApiError::RetriesExhausted {
        attempts: 2,
        status: None,
        body: None,
        source: Some("connection reset".into()),
    };
    assert_eq!(err.to_string(), "retry attempts exhausted after 2 attempt(s)");
    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.to_string(), "connection reset");
}

#[test]
fn terminal_states() {
    use TransactionState::*;
    for state in [Successful, Exhausted, Unrecoverable, ResponseReady] {
        assert!(state.is_done(), "{state:?}");
    }
    for state in [Initial, Retryable] {
        assert!(!state.is_done(), "{state:?}");
    }
    assert!(Exhausted.is_failure() && Unrecoverable.is_failure());
    assert!(!Successful.is_failure());
}
