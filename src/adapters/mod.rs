//! Adapter interfaces for the CMS.
//!
//! A [`ContentSource`] hands raw records to the pipeline; the pipeline
//! never talks HTTP itself. [`CockpitClient`] is the production source.

pub mod cockpit;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use cockpit::CockpitClient;

/// Why a connectivity check failed
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Base URL is invalid or there is no connection to the CMS: {0}")]
    Unreachable(String),

    #[error("Token was rejected by the CMS (HTTP {0})")]
    TokenRejected(u16),

    #[error("Health check failed with HTTP {0}")]
    Status(u16),
}

/// Source of raw CMS records
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Raw records of a flat collection
    async fn fetch_collection(&self, name: &str) -> Result<Vec<Value>>;

    /// Raw root records of a tree, children nested under `_children`
    async fn fetch_tree(&self, name: &str) -> Result<Vec<Value>>;

    /// Verify the CMS is reachable and accepts the credentials
    async fn health_check(&self) -> Result<(), HealthError>;
}
