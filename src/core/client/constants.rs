//! Centralized client defaults.

/// Default User-Agent sent by the built-in HTTP client.
pub(crate) const USER_AGENT: &str = concat!("resilient-api/", env!("CARGO_PKG_VERSION"));

/// Upper bound of the poll attempt counter fed to the backoff; it wraps back to 1 past this.
pub const POLL_ATTEMPT_CAP: u32 = 5;
