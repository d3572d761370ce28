//! HTTP client used by health probes and smoke tests

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;

use crate::errors::DeployError;

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Single request with a per-request timeout
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, DeployError>;

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, DeployError> {
        self.request(Method::GET, url, timeout).await
    }
}

/// `reqwest`-backed client
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, DeployError> {
        let client = Client::builder()
            .user_agent(concat!("shipwright/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn request(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, DeployError> {
        debug!("{} {}", method, url);

        let response = self
            .client
            .request(method, url)
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(HttpResponse { status, body })
    }
}
