//! Resource registries.
//!
//! A [`Registry`] collects every image, asset, markdown body and layout
//! block discovered during one normalization run, keyed by its dedup key.
//! It can only be turned into a [`SealedRegistry`] by materializing every
//! entry, and linking accepts only the sealed form, so links can never be
//! computed against a half-materialized registry.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::ids::{content_hash, NodeId};

/// Category of a discovered resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    Asset,
    Markdown,
    Layout,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Image,
        ResourceKind::Asset,
        ResourceKind::Markdown,
        ResourceKind::Layout,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::Asset => write!(f, "asset"),
            ResourceKind::Markdown => write!(f, "markdown"),
            ResourceKind::Layout => write!(f, "layout"),
        }
    }
}

/// A discovered resource awaiting materialization
#[derive(Debug, Clone, Copy)]
pub struct PendingResource<'a> {
    pub kind: ResourceKind,
    /// Dedup key: absolute URL, markdown text or layout hash
    pub key: &'a str,
    /// Raw value to materialize (URL, text or layout structure)
    pub value: &'a Value,
}

/// Host collaborator that turns registry entries into graph nodes
pub trait Materializer {
    /// Materialize one entry. `Ok(None)` leaves the entry unmaterialized;
    /// links to it degrade to null references.
    fn materialize(&mut self, resource: PendingResource<'_>) -> anyhow::Result<Option<NodeId>>;
}

/// Errors raised while sealing a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to materialize {kind} '{key}': {reason}")]
    Materialize {
        kind: ResourceKind,
        key: String,
        reason: String,
    },
}

/// Entry counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub images: usize,
    pub assets: usize,
    pub markdowns: usize,
    pub layouts: usize,
}

/// Unsealed registry, populated only by the normalizer
#[derive(Debug, Clone, Default)]
pub struct Registry {
    images: BTreeMap<String, Value>,
    assets: BTreeMap<String, Value>,
    markdowns: BTreeMap<String, Value>,
    layouts: BTreeMap<String, Value>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self, kind: ResourceKind) -> &BTreeMap<String, Value> {
        match kind {
            ResourceKind::Image => &self.images,
            ResourceKind::Asset => &self.assets,
            ResourceKind::Markdown => &self.markdowns,
            ResourceKind::Layout => &self.layouts,
        }
    }

    /// Register an image by absolute URL. Idempotent by key.
    pub fn insert_image(&mut self, url: &str) {
        self.images
            .entry(url.to_string())
            .or_insert_with(|| Value::String(url.to_string()));
    }

    /// Register an asset by absolute URL. Idempotent by key.
    pub fn insert_asset(&mut self, url: &str) {
        self.assets
            .entry(url.to_string())
            .or_insert_with(|| Value::String(url.to_string()));
    }

    /// Register a markdown body keyed by its own text
    pub fn insert_markdown(&mut self, text: &str) {
        self.markdowns
            .entry(text.to_string())
            .or_insert_with(|| Value::String(text.to_string()));
    }

    /// Register a layout block under its content hash and return the hash
    pub fn insert_layout(&mut self, layout: &Value) -> String {
        let hash = content_hash(layout);
        self.layouts
            .entry(hash.clone())
            .or_insert_with(|| layout.clone());
        hash
    }

    pub fn contains(&self, kind: ResourceKind, key: &str) -> bool {
        self.entries(kind).contains_key(key)
    }

    /// Keys of one kind, in sorted order
    pub fn keys(&self, kind: ResourceKind) -> impl Iterator<Item = &str> {
        self.entries(kind).keys().map(String::as_str)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            images: self.images.len(),
            assets: self.assets.len(),
            markdowns: self.markdowns.len(),
            layouts: self.layouts.len(),
        }
    }

    /// Materialize every entry, once per distinct key, and seal the registry
    pub fn seal<M: Materializer + ?Sized>(
        self,
        materializer: &mut M,
    ) -> Result<SealedRegistry, RegistryError> {
        let stats = self.stats();
        let mut sealed = SealedRegistry {
            images: BTreeMap::new(),
            assets: BTreeMap::new(),
            markdowns: BTreeMap::new(),
            layouts: BTreeMap::new(),
            stats,
        };

        for kind in ResourceKind::ALL {
            let mut resolved = BTreeMap::new();
            for (key, value) in self.entries(kind) {
                let node = materializer
                    .materialize(PendingResource { kind, key, value })
                    .map_err(|e| RegistryError::Materialize {
                        kind,
                        key: key.clone(),
                        reason: format!("{:#}", e),
                    })?;
                if node.is_none() {
                    debug!(%kind, key = key.as_str(), "Resource left unmaterialized");
                }
                resolved.insert(key.clone(), node);
            }
            *sealed.entries_mut(kind) = resolved;
        }

        info!(
            images = stats.images,
            assets = stats.assets,
            markdowns = stats.markdowns,
            layouts = stats.layouts,
            "Registry sealed"
        );
        Ok(sealed)
    }
}

/// Lookup outcome against a sealed registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Key was registered and materialized
    Node(&'a NodeId),
    /// Key was registered but the materializer declined it
    Unmaterialized,
    /// Key was never registered
    Unknown,
}

impl<'a> Lookup<'a> {
    pub fn node(self) -> Option<&'a NodeId> {
        match self {
            Lookup::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// Registry whose entries have all been offered to a materializer.
/// Read-only; the only input the linker accepts.
#[derive(Debug, Clone)]
pub struct SealedRegistry {
    images: BTreeMap<String, Option<NodeId>>,
    assets: BTreeMap<String, Option<NodeId>>,
    markdowns: BTreeMap<String, Option<NodeId>>,
    layouts: BTreeMap<String, Option<NodeId>>,
    stats: RegistryStats,
}

impl SealedRegistry {
    fn entries(&self, kind: ResourceKind) -> &BTreeMap<String, Option<NodeId>> {
        match kind {
            ResourceKind::Image => &self.images,
            ResourceKind::Asset => &self.assets,
            ResourceKind::Markdown => &self.markdowns,
            ResourceKind::Layout => &self.layouts,
        }
    }

    fn entries_mut(&mut self, kind: ResourceKind) -> &mut BTreeMap<String, Option<NodeId>> {
        match kind {
            ResourceKind::Image => &mut self.images,
            ResourceKind::Asset => &mut self.assets,
            ResourceKind::Markdown => &mut self.markdowns,
            ResourceKind::Layout => &mut self.layouts,
        }
    }

    pub fn lookup(&self, kind: ResourceKind, key: &str) -> Lookup<'_> {
        match self.entries(kind).get(key) {
            Some(Some(node)) => Lookup::Node(node),
            Some(None) => Lookup::Unmaterialized,
            None => Lookup::Unknown,
        }
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }
}
