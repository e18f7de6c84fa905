//! Core orchestration logic.
//!
//! This module contains:
//! - Fetch: concurrent retrieval of every configured collection and tree
//! - Pipeline: the normalize/seal/link passes and the sync runner

pub mod fetch;
pub mod pipeline;

// Re-export commonly used types
pub use fetch::{fetch_all, FetchError, FetchFailure, FetchReport, FetchedSource};
pub use pipeline::{build_forests, run_passes, PassStats, PipelineError, SyncRunner, SyncSummary};
