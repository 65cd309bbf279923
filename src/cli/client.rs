use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::events::QueueSnapshot;
use crate::models::{Download, DownloadRequest};

/// Response envelope mirrored from the HTTP API.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Talks to a running daemon over its local HTTP API.
///
/// Queue commands always go through here rather than touching the store
/// directly, so the engine stays the only writer of download records.
pub struct DaemonClient {
    client: Client,
    base_url: String,
}

impl DaemonClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: format!("http://127.0.0.1:{}/api", config.server.port),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> anyhow::Result<T> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.with_context(|| {
            format!(
                "No daemon reachable at {} (start one with `vidarr daemon`)",
                self.base_url
            )
        })?;

        let status = response.status();
        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Unreadable response from daemon ({status})"))?;

        if !envelope.success {
            bail!(
                envelope
                    .error
                    .unwrap_or_else(|| format!("Daemon returned {status}"))
            );
        }
        envelope
            .data
            .ok_or_else(|| anyhow::anyhow!("Daemon response had no data"))
    }

    pub async fn enqueue(&self, request: &DownloadRequest) -> anyhow::Result<Download> {
        self.request(Method::POST, "/downloads", Some(serde_json::to_value(request)?))
            .await
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Download>> {
        self.request(Method::GET, "/downloads", None).await
    }

    pub async fn queue(&self) -> anyhow::Result<QueueSnapshot> {
        self.request(Method::GET, "/downloads/queue", None).await
    }

    pub async fn pause(&self, id: &str) -> anyhow::Result<String> {
        self.request(Method::POST, &format!("/downloads/{id}/pause"), None)
            .await
    }

    pub async fn resume(&self, id: &str) -> anyhow::Result<String> {
        self.request(Method::POST, &format!("/downloads/{id}/resume"), None)
            .await
    }

    pub async fn cancel(&self, id: &str) -> anyhow::Result<String> {
        self.request(Method::POST, &format!("/downloads/{id}/cancel"), None)
            .await
    }

    pub async fn delete(&self, id: &str) -> anyhow::Result<String> {
        self.request(Method::DELETE, &format!("/downloads/{id}"), None)
            .await
    }

    pub async fn convert(&self, id: &str) -> anyhow::Result<String> {
        self.request(Method::POST, &format!("/downloads/{id}/convert"), None)
            .await
    }

    pub async fn set_provider(&self, name: &str) -> anyhow::Result<String> {
        self.request(
            Method::PUT,
            "/providers/active",
            Some(serde_json::json!({ "name": name })),
        )
        .await
    }
}
