// ABOUTME: Authenticated HTTP plumbing shared by the container store and creation orchestrator
// Bearer credential handling, JSON request helpers, and the streaming POST used for SSE

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{parse_error_body, ClientError};

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// WebSocket endpoint for `path`, derived from the HTTP base URL.
    pub fn ws_url(&self, path: &str) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{base}{path}")
    }

    /// Attach the bearer credential, failing fast before any network call
    /// when no token is configured.
    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(builder.bearer_auth(token))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.authorized(self.http.get(self.url(path)))?;
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.authorized(self.http.post(self.url(path)))?.json(body);
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.authorized(self.http.post(self.url(path)))?;
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let request = self.authorized(self.http.delete(self.url(path)))?;
        check_status(request.send().await?).await?;
        Ok(())
    }

    /// POST returning the raw response for the caller to consume as a byte
    /// stream. Non-success statuses are mapped before any body is read.
    pub async fn post_stream<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ClientError> {
        let request = self.authorized(self.http.post(self.url(path)))?.json(body);
        check_status(request.send().await?).await
    }
}

/// Map non-success responses to `ClientError::Server`, surfacing the
/// server-provided message when the body carries one.
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_error_body(status, &body);
    debug!(%status, %message, "request failed");
    Err(ClientError::Server { status, message })
}
