//! reqwest-backed control-plane client.

use super::{
    CallResult, ControlPlane, HeartbeatRequest, RegisterRequest, HEARTBEAT_PATH, LIST_PATH,
    REGISTER_PATH,
};
use crate::error::ControlPlaneError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Control-plane client over HTTP.
///
/// Every request carries the configured timeout. The listing is an
/// unauthenticated GET.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    base_url: String,
    http: reqwest::Client,
}

impl HttpControlPlane {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and time the whole exchange, body included.
    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> CallResult {
        let url = self.url(path);
        let start = Instant::now();

        let response = match self.http.post(&url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("POST {} failed: {}", url, e);
                return CallResult::transport_failure(elapsed_ms(start));
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => {
                if !(200..300).contains(&status) {
                    tracing::debug!(
                        "POST {} returned {}: {}",
                        url,
                        status,
                        String::from_utf8_lossy(&body)
                    );
                }
                CallResult::from_status(status, elapsed_ms(start))
            }
            Err(e) => {
                tracing::debug!("POST {} body read failed: {}", url, e);
                CallResult::transport_failure(elapsed_ms(start))
            }
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn register(&self, request: RegisterRequest) -> CallResult {
        self.post_json(REGISTER_PATH, &request).await
    }

    async fn heartbeat(&self, request: HeartbeatRequest) -> CallResult {
        self.post_json(HEARTBEAT_PATH, &request).await
    }

    async fn list_relays(&self) -> Result<Vec<serde_json::Value>, ControlPlaneError> {
        let response = self
            .http
            .get(self.url(LIST_PATH))
            .send()
            .await?
            .error_for_status()?;

        match response.json::<serde_json::Value>().await? {
            serde_json::Value::Array(entries) => Ok(entries),
            other => Err(ControlPlaneError::UnexpectedBody(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
