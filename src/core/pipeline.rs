//! End-to-end sync run.
//!
//! fetch (concurrent) -> build forests -> normalize (one registry for the
//! whole run) -> seal (materialize every entry) -> link -> item nodes.
//!
//! Sealing consumes the registry and linking only takes the sealed form,
//! so the normalize/link barrier is enforced by the types.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::adapters::{ContentSource, HealthError};
use crate::config::ResolvedConfig;
use crate::content::ContentForest;
use crate::graph::Graph;
use crate::ids::Locale;
use crate::link::{link_all, LinkError, LinkStats, ObjectNodeFactory};
use crate::normalize::{normalize_all, Materializer, RegistryError, RegistryStats};

use super::fetch::{fetch_all, FetchError, FetchFailure, FetchedSource};

/// Errors that end a sync run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Health(#[from] HealthError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Counters from the normalize and link passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub registry: RegistryStats,
    pub link: LinkStats,
}

/// What one sync run did
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub forests: usize,
    pub items: usize,
    pub resources: RegistryStats,
    pub linked_fields: usize,
    pub missing_media: usize,
    pub failed_sources: Vec<String>,
}

/// Build content forests from fetched records, applying published-name aliases
pub fn build_forests(fetched: &[FetchedSource], config: &ResolvedConfig) -> Vec<ContentForest> {
    fetched
        .iter()
        .map(|source| {
            ContentForest::build(
                source.kind,
                &source.name,
                config.published_name(source.kind, &source.name),
                &source.records,
                &Locale::Any,
            )
        })
        .collect()
}

/// Normalize, materialize and link forests against a host node store
pub fn run_passes<H>(
    base_url: &str,
    forests: &mut [ContentForest],
    host: &mut H,
) -> Result<PassStats, PipelineError>
where
    H: Materializer + ObjectNodeFactory,
{
    let registry = normalize_all(base_url, forests);
    let sealed = registry.seal(host)?;
    let link = link_all(&sealed, host, forests)?;

    Ok(PassStats {
        registry: sealed.stats(),
        link,
    })
}

/// Runs sync cycles against one content source
pub struct SyncRunner {
    config: ResolvedConfig,
    source: Arc<dyn ContentSource>,
}

impl SyncRunner {
    pub fn new(config: ResolvedConfig, source: Arc<dyn ContentSource>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Connectivity and credential check; must pass before any fetch
    pub async fn check(&self) -> Result<(), PipelineError> {
        self.source.health_check().await?;
        info!(base_url = %self.config.base_url, "CMS reachable, token accepted");
        Ok(())
    }

    /// Run one full cycle, adding every node to `graph`
    #[instrument(skip(self, graph), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, graph: &mut Graph) -> Result<SyncSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        info!("Starting sync");

        self.check().await?;

        let report = fetch_all(
            Arc::clone(&self.source),
            &self.config.collections,
            &self.config.trees,
        )
        .await
        .into_result(self.config.on_fetch_error)?;

        let mut forests = build_forests(&report.fetched, &self.config);
        let stats = run_passes(&self.config.base_url, &mut forests, graph)?;

        for forest in &forests {
            graph.add_forest(forest);
        }

        let summary = SyncSummary {
            run_id,
            forests: forests.len(),
            items: forests.iter().map(ContentForest::item_count).sum(),
            resources: stats.registry,
            linked_fields: stats.link.linked,
            missing_media: stats.link.missing_media,
            failed_sources: report.failures.iter().map(FetchFailure::to_string).collect(),
        };
        info!(
            forests = summary.forests,
            items = summary.items,
            nodes = graph.len(),
            "Sync complete"
        );
        Ok(summary)
    }
}
