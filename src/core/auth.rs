//! Request signing.
//!
//! An [`Authorizer`] runs on every physical attempt, after default headers are
//! applied, so credentials may legitimately change between retries.

use crate::core::ApiError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// Mutates an outgoing request to add credentials.
pub trait Authorizer: Send + Sync {
    /// Signs `request` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be signed. The call then fails
    /// without sending the attempt.
    fn authorize(&self, request: &mut reqwest::Request) -> Result<(), ApiError>;
}

/// Leaves requests untouched. Used when no authorizer is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Authorizer for NoAuth {
    fn authorize(&self, _request: &mut reqwest::Request) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Sends `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authorizer for BearerToken {
    fn authorize(&self, request: &mut reqwest::Request) -> Result<(), ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ApiError::Auth("bearer token is not a valid header value".into()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// HTTP basic authentication.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: Option<String>,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

impl Authorizer for BasicAuth {
    fn authorize(&self, request: &mut reqwest::Request) -> Result<(), ApiError> {
        let credentials = match &self.password {
            Some(password) => format!("{}:{password}", self.username),
            None => format!("{}:", self.username),
        };
        let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(credentials)))
            .map_err(|_| ApiError::Auth("basic credentials are not a valid header value".into()))?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

/// Where an [`ApiKey`] is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLocation {
    /// As a request header.
    Header,
    /// As a query parameter.
    Query,
}

/// A static API key sent as a header or query parameter.
#[derive(Debug, Clone)]
pub struct ApiKey {
    name: String,
    value: String,
    location: KeyLocation,
}

impl ApiKey {
    pub fn new(name: impl Into<String>, value: impl Into<String>, location: KeyLocation) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            location,
        }
    }
}

impl Authorizer for ApiKey {
    fn authorize(&self, request: &mut reqwest::Request) -> Result<(), ApiError> {
        match self.location {
            KeyLocation::Header => {
                let name = HeaderName::from_bytes(self.name.as_bytes())
                    .map_err(|_| ApiError::Auth(format!("invalid api key header `{}`", self.name)))?;
                let mut value = HeaderValue::from_str(&self.value)
                    .map_err(|_| ApiError::Auth("api key is not a valid header value".into()))?;
                value.set_sensitive(true);
                request.headers_mut().insert(name, value);
            }
            KeyLocation::Query => {
                let url = request.url_mut();
                let kept: Vec<(String, String)> = url
                    .query_pairs()
                    .filter(|(k, _)| k.as_ref() != self.name.as_str())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                let mut pairs = url.query_pairs_mut();
                pairs.clear();
                for (k, v) in &kept {
                    pairs.append_pair(k, v);
                }
                pairs.append_pair(&self.name, &self.value);
            }
        }
        Ok(())
    }
}
