//! Shared request engine: every outbound HTTP call in the crate goes through
//! here so retry behavior, timeouts and decoding stay uniform.
//!
//! Retry policy: up to `network.max_retry_attempts` attempts with a fixed
//! pause in between. Server errors (5xx) and transport failures are retried;
//! client errors (4xx) fail the request on the first response, since
//! repeating them cannot change the outcome.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::warn;
use url::Url;

use crate::config::NetworkConfig;
use crate::errors::NetworkError;

/// Declarative description of one HTTP request.
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: Method,
    base_url: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl Endpoint {
    #[must_use]
    pub fn get(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::GET, base_url, path)
    }

    #[must_use]
    pub fn post(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::POST, base_url, path)
    }

    fn new(method: Method, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Final URL with the query string applied.
    pub fn url(&self) -> Result<Url, NetworkError> {
        let joined = if self.path.is_empty() {
            self.base_url.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                self.path.trim_start_matches('/')
            )
        };

        let mut url =
            Url::parse(&joined).map_err(|e| NetworkError::InvalidUrl(format!("{joined}: {e}")))?;

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }
}

/// Stateless executor over a shared pooled client; cheap to clone and safe to
/// use concurrently.
#[derive(Debug, Clone)]
pub struct RequestEngine {
    client: reqwest::Client,
    max_attempts: u32,
    retry_delay: Duration,
}

/// Shared HTTP client reused by every service so connections pool instead of
/// exhausting sockets.
pub fn build_shared_http_client(network: &NetworkConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(network.timeout_seconds))
        .user_agent(&network.user_agent)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Client for long-running media transfers. No total request timeout: a
/// multi-gigabyte body legitimately outlives any fixed deadline, and dead
/// streams are caught by the engine's stall detection instead.
pub fn build_transfer_http_client(network: &NetworkConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(network.timeout_seconds))
        .read_timeout(Duration::from_secs(network.timeout_seconds))
        .user_agent(&network.user_agent)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build transfer HTTP client: {e}"))
}

impl RequestEngine {
    #[must_use]
    pub fn new(client: reqwest::Client, network: &NetworkConfig) -> Self {
        Self {
            client,
            max_attempts: network.max_retry_attempts.max(1),
            retry_delay: Duration::from_millis(network.retry_delay_ms),
        }
    }

    /// Executes the endpoint and returns the response body as text.
    pub async fn execute(&self, endpoint: &Endpoint) -> Result<String, NetworkError> {
        let url = endpoint.url()?;

        let mut last_error = NetworkError::Unknown("no attempts made".to_string());
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.attempt(endpoint, url.clone()).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        url = %url,
                        error = %err,
                        "request attempt failed"
                    );
                    last_error = err;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }

    /// Executes the endpoint and decodes the JSON body into `T`.
    ///
    /// Decode failures are final: a body that does not match the expected
    /// shape will not look different on a retry.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
    ) -> Result<T, NetworkError> {
        let body = self.execute(endpoint).await?;
        serde_json::from_str(&body).map_err(NetworkError::Decode)
    }

    async fn attempt(&self, endpoint: &Endpoint, url: Url) -> Result<String, NetworkError> {
        let mut request = self.client.request(endpoint.method.clone(), url);

        for (name, value) in &endpoint.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &endpoint.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(NetworkError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|_| NetworkError::InvalidResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_builds_url_with_query() {
        let endpoint = Endpoint::get("https://api.example.com/v3/", "/search/multi")
            .with_query("query", "space odyssey")
            .with_query("page", "2");

        let url = endpoint.url().unwrap();
        assert_eq!(url.host_str(), Some("api.example.com"));
        assert_eq!(url.path(), "/v3/search/multi");
        assert_eq!(url.query(), Some("query=space+odyssey&page=2"));
    }

    #[test]
    fn endpoint_rejects_invalid_base() {
        let endpoint = Endpoint::get("not a url", "path");
        assert!(matches!(
            endpoint.url(),
            Err(NetworkError::InvalidUrl(_))
        ));
    }

    #[test]
    fn empty_path_uses_base_as_is() {
        let endpoint = Endpoint::get("https://example.com/embed/movie/603", "");
        assert_eq!(
            endpoint.url().unwrap().as_str(),
            "https://example.com/embed/movie/603"
        );
    }
}
