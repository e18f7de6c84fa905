//! Reference linking pass.
//!
//! Runs after every registry entry has been materialized and rewrites
//! field values into foreign-key references. It only accepts a
//! [`SealedRegistry`], so it cannot run before materialization.
//!
//! Miss policy:
//! - image, gallery, asset: a miss is broken media in the CMS; the
//!   reference becomes null (galleries drop the entry) and linking goes on
//! - markdown, layout: always registered by normalization, so a miss is a
//!   pipeline bug and fails the run
//! - one-to-many collection links spanning several collections fail the run

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::content::{
    ContentForest, ContentItem, Field, ImageField, LinkTargets, LinkedNodes, RecordLink,
};
use crate::ids::{content_hash, record_node_id, Locale, NodeId};
use crate::normalize::{Lookup, ResourceKind, SealedRegistry};

/// Host collaborator that materializes `object` field values as nodes
pub trait ObjectNodeFactory {
    fn create_object_node(&mut self, value: &Value) -> anyhow::Result<NodeId>;
}

/// Errors that abort linking
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(
        "One to many collection links must refer to entries from a single collection \
         (item '{item}', field '{field}', collections: {})",
        .collections.join(", ")
    )]
    MixedCollections {
        item: String,
        field: String,
        collections: Vec<String>,
    },

    #[error("Inconsistent registry: {kind} of item '{item}', field '{field}' was never registered (key '{key}')")]
    Unregistered {
        kind: ResourceKind,
        item: String,
        field: String,
        key: String,
    },

    #[error("Inconsistent registry: {kind} of item '{item}', field '{field}' was registered but never materialized")]
    Unmaterialized {
        kind: ResourceKind,
        item: String,
        field: String,
    },

    #[error("Failed to create object node for item '{item}', field '{field}': {reason}")]
    ObjectNode {
        item: String,
        field: String,
        reason: String,
    },
}

/// Counters for one linking run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Fields rewritten into references
    pub linked: usize,
    /// Image and asset references that degraded to null
    pub missing_media: usize,
}

/// Second-pass linker over a sealed registry
pub struct Linker<'a, F: ObjectNodeFactory + ?Sized> {
    registry: &'a SealedRegistry,
    objects: &'a mut F,
    stats: LinkStats,
}

impl<'a, F: ObjectNodeFactory + ?Sized> Linker<'a, F> {
    pub fn new(registry: &'a SealedRegistry, objects: &'a mut F) -> Self {
        Self {
            registry,
            objects,
            stats: LinkStats::default(),
        }
    }

    /// Link every item of a forest in place
    #[instrument(skip(self, forest), fields(kind = %forest.kind, name = %forest.name))]
    pub fn link_forest(&mut self, forest: &mut ContentForest) -> Result<(), LinkError> {
        for item in &mut forest.items {
            self.link_item(item)?;
        }
        debug!(items = forest.item_count(), "Forest linked");
        Ok(())
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn link_item(&mut self, item: &mut ContentItem) -> Result<(), LinkError> {
        let registry = self.registry;
        for (name, field) in item.fields.iter_mut() {
            match field {
                Field::Scalar(_) => continue,
                Field::Image(image) => {
                    if !self.link_image(image) {
                        debug!(
                            item = %item.id,
                            field = %name,
                            "Image not materialized, reference set to null"
                        );
                        self.stats.missing_media += 1;
                        continue;
                    }
                }
                Field::Gallery(gallery) => {
                    let total = gallery.images.len();
                    let nodes: Vec<NodeId> = gallery
                        .images
                        .iter()
                        .filter_map(|image| image.path.as_deref())
                        .filter_map(|url| registry.lookup(ResourceKind::Image, url).node())
                        .cloned()
                        .collect();
                    self.stats.missing_media += total - nodes.len();
                    gallery.images.clear();
                    gallery.nodes = Some(nodes);
                }
                Field::Asset(asset) => {
                    let node = asset
                        .path
                        .as_deref()
                        .and_then(|url| registry.lookup(ResourceKind::Asset, url).node())
                        .cloned();
                    asset.path = None;
                    if node.is_none() {
                        debug!(
                            item = %item.id,
                            field = %name,
                            "Asset not materialized, reference set to null"
                        );
                        self.stats.missing_media += 1;
                        continue;
                    }
                    asset.node = node;
                }
                Field::Markdown(markdown) => {
                    let node = self
                        .expect_node(ResourceKind::Markdown, &markdown.text)
                        .map_err(|miss| {
                            miss.into_error(ResourceKind::Markdown, &item.id, name, &markdown.text)
                        })?;
                    markdown.node = Some(node);
                }
                Field::Layout(layout) => {
                    let hash = content_hash(&layout.value);
                    let node = self
                        .expect_node(ResourceKind::Layout, &hash)
                        .map_err(|miss| {
                            miss.into_error(ResourceKind::Layout, &item.id, name, &hash)
                        })?;
                    layout.node = Some(node);
                }
                Field::CollectionLink(link) => {
                    let nodes = link_targets(&link.targets, &item.locale).map_err(|collections| {
                        LinkError::MixedCollections {
                            item: item.id.clone(),
                            field: name.clone(),
                            collections,
                        }
                    })?;
                    link.nodes = Some(nodes);
                }
                Field::Object(object) => {
                    let node = self.objects.create_object_node(&object.value).map_err(|e| {
                        LinkError::ObjectNode {
                            item: item.id.clone(),
                            field: name.clone(),
                            reason: format!("{:#}", e),
                        }
                    })?;
                    object.node = Some(node);
                }
            }
            self.stats.linked += 1;
        }

        for child in &mut item.children {
            self.link_item(child)?;
        }
        Ok(())
    }

    /// Returns false when the image degraded to a null reference
    fn link_image(&self, image: &mut ImageField) -> bool {
        let node = image
            .path
            .as_deref()
            .and_then(|url| self.registry.lookup(ResourceKind::Image, url).node())
            .cloned();
        image.path = None;
        image.node = node;
        image.node.is_some()
    }

    fn expect_node(&self, kind: ResourceKind, key: &str) -> Result<NodeId, Miss> {
        match self.registry.lookup(kind, key) {
            Lookup::Node(node) => Ok(node.clone()),
            Lookup::Unmaterialized => Err(Miss::Unmaterialized),
            Lookup::Unknown => Err(Miss::Unregistered),
        }
    }
}

enum Miss {
    Unregistered,
    Unmaterialized,
}

impl Miss {
    fn into_error(self, kind: ResourceKind, item: &str, field: &str, key: &str) -> LinkError {
        match self {
            Miss::Unregistered => LinkError::Unregistered {
                kind,
                item: item.to_string(),
                field: field.to_string(),
                key: key.chars().take(80).collect(),
            },
            Miss::Unmaterialized => LinkError::Unmaterialized {
                kind,
                item: item.to_string(),
                field: field.to_string(),
            },
        }
    }
}

/// Resolve link targets to record node ids. Err carries the distinct
/// collections of a heterogeneous one-to-many link.
fn link_targets(targets: &LinkTargets, locale: &Locale) -> Result<LinkedNodes, Vec<String>> {
    let node = |link: &RecordLink| record_node_id(&link.collection, &link.id, locale);

    match targets {
        LinkTargets::One(link) => Ok(LinkedNodes::One(node(link))),
        LinkTargets::Many(links) => {
            let mut collections: Vec<String> = Vec::new();
            for link in links {
                if !collections.contains(&link.collection) {
                    collections.push(link.collection.clone());
                }
            }
            if collections.len() > 1 {
                return Err(collections);
            }
            Ok(LinkedNodes::Many(links.iter().map(node).collect()))
        }
    }
}

/// Link all forests against one sealed registry
pub fn link_all<F: ObjectNodeFactory + ?Sized>(
    registry: &SealedRegistry,
    objects: &mut F,
    forests: &mut [ContentForest],
) -> Result<LinkStats, LinkError> {
    let mut linker = Linker::new(registry, objects);
    for forest in forests.iter_mut() {
        linker.link_forest(forest)?;
    }

    let stats = linker.stats();
    info!(
        linked = stats.linked,
        missing_media = stats.missing_media,
        "Linking complete"
    );
    Ok(stats)
}
