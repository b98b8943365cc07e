//! Thin reqwest wrapper shared by the submitter and the connectivity probe.
//!
//! Retries are the sync engine's job, so the client sends each request
//! exactly once and hands the raw outcome back for classification.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use shiftsync_domain::{Result, ShiftSyncError, SubmissionConfig};
use tracing::debug;

use crate::errors::InfraError;

const USER_AGENT: &str = concat!("shiftsync/", env!("CARGO_PKG_VERSION"));

/// HTTP client with a fixed timeout and default headers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Client configured for the submission endpoint.
    pub fn from_config(config: &SubmissionConfig) -> Result<Self> {
        let mut builder = Self::builder().timeout(config.timeout());
        if let Some(token) = &config.auth_token {
            builder = builder.bearer_token(token);
        }
        builder.build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send once; errors are returned unclassified.
    pub async fn send(&self, builder: RequestBuilder) -> std::result::Result<Response, reqwest::Error> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(request).await?;
        debug!(%method, %url, status = %response.status(), "received HTTP response");
        Ok(response)
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    bearer_token: Option<String>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: HeaderMap::new(),
            bearer_token: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut headers = self.default_headers;
        if let Some(token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ShiftSyncError::Config("auth token is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .no_proxy()
            .user_agent(self.user_agent.unwrap_or_else(|| USER_AGENT.to_string()))
            .default_headers(headers)
            .build()
            .map_err(|err| ShiftSyncError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
