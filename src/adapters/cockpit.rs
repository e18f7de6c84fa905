//! HTTP client for the Cockpit content API.
//!
//! Endpoints (relative to `{base_url}/api`):
//! - `GET /content/items/{collection}`
//! - `GET /content/tree/{tree}`
//! - `GET /system/healthcheck`
//!
//! Auth: `api-key` header.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{ContentSource, HealthError};

/// Cockpit API client
pub struct CockpitClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl CockpitClient {
    /// Create a client with the given per-request timeout
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Build API URL
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api{}", self.base_url, endpoint)
    }

    async fn get(&self, endpoint: &str) -> Result<reqwest::Response> {
        let url = self.api_url(endpoint);
        self.client
            .get(&url)
            .header("api-key", &self.token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))
    }

    async fn fetch_records(&self, endpoint: &str) -> Result<Vec<Value>> {
        let response = self
            .get(endpoint)
            .await?
            .error_for_status()
            .with_context(|| format!("CMS rejected request for {}", endpoint))?;

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response for {}", endpoint))?;

        match body {
            Value::Array(records) => {
                debug!(endpoint, records = records.len(), "Fetched records");
                Ok(records)
            }
            other => anyhow::bail!(
                "Expected a JSON array from {}, got {}",
                endpoint,
                json_kind(&other)
            ),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl ContentSource for CockpitClient {
    fn name(&self) -> &str {
        "cockpit"
    }

    #[instrument(skip(self))]
    async fn fetch_collection(&self, name: &str) -> Result<Vec<Value>> {
        self.fetch_records(&format!("/content/items/{}", name)).await
    }

    #[instrument(skip(self))]
    async fn fetch_tree(&self, name: &str) -> Result<Vec<Value>> {
        self.fetch_records(&format!("/content/tree/{}", name)).await
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        let response = self
            .get("/system/healthcheck")
            .await
            .map_err(|e| HealthError::Unreachable(format!("{:#}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(HealthError::TokenRejected(response.status().as_u16()))
            }
            status => Err(HealthError::Status(status.as_u16())),
        }
    }
}
