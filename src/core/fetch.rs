//! Concurrent fetch of every configured collection and tree.
//!
//! All requests run at once on a `JoinSet` and are awaited together; no
//! content is processed until every request has settled. Failures are
//! reported per name instead of being swallowed.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::adapters::ContentSource;
use crate::config::FetchErrorPolicy;
use crate::content::SourceKind;

/// Raw records fetched for one name
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub kind: SourceKind,
    pub name: String,
    pub records: Vec<Value>,
}

/// A name whose fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub kind: SourceKind,
    pub name: String,
    pub reason: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.name, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch aborted, {} source(s) failed: {}", .failures.len(), join_failures(.failures))]
    Aborted { failures: Vec<FetchFailure> },
}

fn join_failures(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of fetching all names: successes in configuration order plus failures
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub fetched: Vec<FetchedSource>,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Apply the configured failure policy
    pub fn into_result(self, policy: FetchErrorPolicy) -> Result<Self, FetchError> {
        match policy {
            FetchErrorPolicy::Abort if !self.failures.is_empty() => Err(FetchError::Aborted {
                failures: self.failures,
            }),
            _ => Ok(self),
        }
    }
}

/// Fetch all collections and trees concurrently
#[instrument(
    skip_all,
    fields(source = source.name(), collections = collections.len(), trees = trees.len())
)]
pub async fn fetch_all(
    source: Arc<dyn ContentSource>,
    collections: &[String],
    trees: &[String],
) -> FetchReport {
    let requests: Vec<(SourceKind, String)> = collections
        .iter()
        .map(|name| (SourceKind::Collection, name.clone()))
        .chain(trees.iter().map(|name| (SourceKind::Tree, name.clone())))
        .collect();

    let mut set = JoinSet::new();
    for (index, (kind, name)) in requests.iter().cloned().enumerate() {
        let source = Arc::clone(&source);
        set.spawn(async move {
            let result = match kind {
                SourceKind::Collection => source.fetch_collection(&name).await,
                SourceKind::Tree => source.fetch_tree(&name).await,
            };
            (index, result)
        });
    }

    let mut results: Vec<Option<Result<Vec<Value>, String>>> = vec![None; requests.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => {
                results[index] = Some(result.map_err(|e| format!("{:#}", e)));
            }
            Err(e) => warn!(error = %e, "Fetch task did not complete"),
        }
    }

    let mut report = FetchReport::default();
    for ((kind, name), result) in requests.into_iter().zip(results) {
        match result {
            Some(Ok(records)) => report.fetched.push(FetchedSource {
                kind,
                name,
                records,
            }),
            Some(Err(reason)) => {
                warn!(%kind, name = %name, %reason, "Fetch failed");
                report.failures.push(FetchFailure { kind, name, reason });
            }
            None => report.failures.push(FetchFailure {
                kind,
                name,
                reason: "fetch task did not complete".to_string(),
            }),
        }
    }

    info!(
        fetched = report.fetched.len(),
        failed = report.failures.len(),
        "Fetch complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::HealthError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Answers in reverse order of request, fails for names starting with "bad"
    struct SlowSource;

    #[async_trait]
    impl ContentSource for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch_collection(&self, name: &str) -> anyhow::Result<Vec<Value>> {
            if name.starts_with("bad") {
                anyhow::bail!("HTTP 404 for {}", name);
            }
            let delay = if name == "first" { 30 } else { 1 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(vec![json!({"_id": name})])
        }

        async fn fetch_tree(&self, name: &str) -> anyhow::Result<Vec<Value>> {
            Ok(vec![json!({"_id": format!("{}-root", name)})])
        }

        async fn health_check(&self) -> Result<(), HealthError> {
            Ok(())
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_results_keep_configuration_order() {
        let report = fetch_all(
            Arc::new(SlowSource),
            &names(&["first", "second"]),
            &names(&["pages"]),
        )
        .await;

        let fetched: Vec<&str> = report.fetched.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fetched, vec!["first", "second", "pages"]);
        assert_eq!(report.fetched[2].kind, SourceKind::Tree);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_failures_are_reported() {
        let report = fetch_all(Arc::new(SlowSource), &names(&["bad-one", "good"]), &[]).await;

        assert_eq!(report.fetched.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "bad-one");
        assert!(report.failures[0].reason.contains("404"));

        let skipped = report.clone().into_result(FetchErrorPolicy::Skip).unwrap();
        assert_eq!(skipped.fetched.len(), 1);

        let err = report.into_result(FetchErrorPolicy::Abort).unwrap_err();
        assert!(err.to_string().contains("bad-one"));
    }
}
