use super::ApiClient;
use crate::core::context::CallContext;
use crate::core::request::ApiRequest;
use crate::core::{ApiError, Response};

/// Routes absolute URLs to the client whose base URL prefixes them.
#[derive(Debug, Clone, Default)]
pub struct ClientGroup {
    clients: Vec<ApiClient>,
}

impl ClientGroup {
    pub fn new(clients: impl IntoIterator<Item = ApiClient>) -> Self {
        Self {
            clients: clients.into_iter().collect(),
        }
    }

    /// Adds a client. Earlier clients take precedence when several match.
    pub fn push(&mut self, client: ApiClient) {
        self.clients.push(client);
    }

    /// Returns the first client whose base URL prefixes `url`.
    pub fn client_for(&self, url: &str) -> Option<&ApiClient> {
        self.clients
            .iter()
            .find(|client| url.starts_with(client.base_url()))
    }

    /// Issues a GET for an absolute `url` through the matching client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NoMatchingClient`] if no client serves `url`, and
    /// otherwise whatever the matching client's call returns.
    pub async fn get(&self, url: &str) -> Result<Response, ApiError> {
        self.get_with(url, &CallContext::new()).await
    }

    /// Like [`get`](Self::get), under the cancellation and deadline of `ctx`.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`ApiError::Cancelled`] once `ctx` fires.
    pub async fn get_with(&self, url: &str, ctx: &CallContext) -> Result<Response, ApiError> {
        let client = self
            .client_for(url)
            .ok_or_else(|| ApiError::NoMatchingClient(url.to_string()))?;
        let path = &url[client.base_url().len()..];
        client.execute_with(&ApiRequest::get(path), ctx).await
    }
}
