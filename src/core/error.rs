use thiserror::Error;

/// Boxed error produced by a [`Transport`](crate::core::transport::Transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a call was aborted before it reached a terminal outcome on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The caller's deadline passed.
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("request cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Coarse classification of a failed call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The attempt budget ran out (transport failures or retryable statuses).
    TransportExhausted,
    /// The server answered with a status the retry policy refused to retry.
    UnrecoverableStatus,
    /// The caller cancelled the call or its deadline passed.
    Cancelled,
    /// A response arrived but its body could not be read.
    BodyRead,
    /// Anything else (configuration, serialization, authorization...).
    Other,
}

/// The primary error type for all fallible operations in this crate.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP client could not be built or a request could not be constructed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The base URL parsed but cannot address a server.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// A single attempt failed before any response was received.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// Every permitted attempt was used without a successful response.
    #[error("retry attempts exhausted after {attempts} attempt(s){}", describe_last(.status, .body))]
    RetriesExhausted {
        /// Number of physical attempts made.
        attempts: u32,
        /// Status of the last response, if the last attempt got one.
        status: Option<u16>,
        /// Body of the last response, when it could be read.
        body: Option<String>,
        /// The last transport failure, if the last attempt got no response.
        #[source]
        source: Option<BoxError>,
    },

    /// The server returned a status the retry policy does not retry.
    #[error("unexpected status code {status} at {url}{}", describe_body(.body))]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
        /// The response body, when it could be read.
        body: Option<String>,
    },

    /// The call was cancelled or timed out.
    #[error("{0}")]
    Cancelled(CancelReason),

    /// The response body could not be fully read.
    #[error("failed to read response body: {0}")]
    BodyRead(#[source] reqwest::Error),

    /// An authorizer refused to sign the request.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// A JSON payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A poll readiness check failed.
    #[error("readiness check failed: {0}")]
    Readiness(String),

    /// A background poll worker did not run to completion.
    #[error("poll task failed: {0}")]
    Task(String),

    /// No client in a group is configured for the requested URL.
    #[error("no matching client found for {0}")]
    NoMatchingClient(String),
}

impl ApiError {
    /// Maps this error onto the failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RetriesExhausted { .. } | Self::Transport(_) => ErrorKind::TransportExhausted,
            Self::Status { .. } => ErrorKind::UnrecoverableStatus,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::BodyRead(_) => ErrorKind::BodyRead,
            _ => ErrorKind::Other,
        }
    }

    /// Returns `true` if the call was cancelled or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The status code of the last response, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { status, .. } => *status,
            _ => None,
        }
    }
}

fn describe_last(status: &Option<u16>, body: &Option<String>) -> String {
    match status {
        Some(code) => format!(" (last status {code}){}", describe_body(body)),
        None => String::new(),
    }
}

fn describe_body(body: &Option<String>) -> String {
    match body.as_deref() {
        Some(b) if !b.is_empty() => format!(", error body: {b}"),
        _ => String::new(),
    }
}
