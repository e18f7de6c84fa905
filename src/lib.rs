//! cockpit-graph - Cockpit CMS content as a linked node graph
//!
//! Fetches collections and trees from a Cockpit CMS and turns every
//! record into a graph node whose media, markdown, layouts and
//! cross-collection links are references to other nodes.
//!
//! # Architecture
//!
//! A sync run is two passes over the whole content set:
//! - Normalize: classify fields, absolutize URLs and register every
//!   image, asset, markdown and layout in one run-wide registry
//! - Link: after the registry is sealed (every entry materialized as a
//!   node), replace field values with node references
//!
//! Linking only accepts a [`SealedRegistry`], so no field can be linked
//! before the whole run has been normalized.
//!
//! # Modules
//!
//! - `adapters`: CMS access (`ContentSource`, `CockpitClient`)
//! - `content`: Field model and content trees
//! - `normalize`: Resource registry, normalizer and markdown scanner
//! - `link`: Reference linker
//! - `graph`: In-memory node store
//! - `core`: Concurrent fetch and the sync runner
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! cockpit-graph check
//! cockpit-graph sync --output graph.json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod content;
pub mod core;
pub mod graph;
pub mod ids;
pub mod link;
pub mod normalize;

// Re-export main types at crate root for convenience
pub use adapters::{CockpitClient, ContentSource};
pub use content::{ContentForest, ContentItem, Field, FieldType, SourceKind};
pub use core::{SyncRunner, SyncSummary};
pub use graph::{Graph, Node};
pub use ids::{generate_node_id, Locale, NodeId};
pub use link::{link_all, LinkError, Linker, ObjectNodeFactory};
pub use normalize::{normalize_all, Materializer, Normalizer, Registry, SealedRegistry};
