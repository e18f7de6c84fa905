//! Resource normalization pass.
//!
//! Walks every fetched forest once, depth-first, and for each typed field:
//! - `image` / `gallery`: absolutize the path, flatten gallery entries, register the URL
//! - `asset`: strip CMS-internal attributes, build the uploads URL, register it
//! - `markdown`: register the text and any media it references
//! - `layout` / `layout-grid`: register the block under its content hash
//!
//! One [`Registry`] spans the whole run so identical resources found in
//! different items collapse to a single entry.

pub mod markdown;
pub mod registry;

use tracing::{debug, info, instrument, warn};

use crate::content::{AssetField, ContentForest, ContentItem, Field, GalleryField, ImageField};

pub use registry::{
    Lookup, Materializer, PendingResource, Registry, RegistryError, RegistryStats, ResourceKind,
    SealedRegistry,
};

/// Path segment under which Cockpit serves uploaded assets
pub const UPLOADS_PATH: &str = "/storage/uploads";

/// Asset attributes that only matter inside the CMS
const ASSET_INTERNAL_ATTRIBUTES: &[&str] = &[
    "_id", "path", "title", "mime", "size", "image", "video", "audio", "archive", "document",
    "code", "created", "modified", "_by",
];

/// Single-run normalizer. Owns the registry until [`Normalizer::finish`].
#[derive(Debug)]
pub struct Normalizer {
    base_url: String,
    registry: Registry,
}

impl Normalizer {
    /// `base_url` is the CMS root, e.g. `https://cms.example`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            registry: Registry::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Normalize one forest in place, adding its resources to the run's registry
    #[instrument(skip(self, forest), fields(kind = %forest.kind, name = %forest.name))]
    pub fn normalize_forest(&mut self, forest: &mut ContentForest) {
        for item in &mut forest.items {
            normalize_item(&self.base_url, item, &mut self.registry);
        }
        debug!(items = forest.item_count(), "Forest normalized");
    }

    /// End the run and hand over the populated registry
    pub fn finish(self) -> Registry {
        let stats = self.registry.stats();
        info!(
            images = stats.images,
            assets = stats.assets,
            markdowns = stats.markdowns,
            layouts = stats.layouts,
            "Normalization complete"
        );
        self.registry
    }

    /// Absolute URL for an image or markdown link target
    pub fn absolutize(&self, path: &str) -> String {
        absolutize(&self.base_url, path)
    }
}

/// Normalize all forests with one shared registry
pub fn normalize_all(base_url: &str, forests: &mut [ContentForest]) -> Registry {
    let mut normalizer = Normalizer::new(base_url);
    for forest in forests.iter_mut() {
        normalizer.normalize_forest(forest);
    }
    normalizer.finish()
}

fn normalize_item(base_url: &str, item: &mut ContentItem, registry: &mut Registry) {
    for (name, field) in item.fields.iter_mut() {
        match field {
            Field::Image(image) => normalize_image(base_url, image, registry),
            Field::Gallery(gallery) => normalize_gallery(base_url, gallery, registry),
            Field::Asset(asset) => {
                if !normalize_asset(base_url, asset, registry) {
                    warn!(item = %item.id, field = %name, "Asset without path");
                }
            }
            Field::Markdown(body) => {
                registry.insert_markdown(&body.text);
                let refs = markdown::scan(&body.text);
                for image in refs.images {
                    registry.insert_image(&absolutize(base_url, &image));
                }
                for asset in refs.assets {
                    registry.insert_asset(&absolutize(base_url, &asset));
                }
            }
            Field::Layout(layout) => {
                // TODO: register images and markdown nested inside layout components
                registry.insert_layout(&layout.value);
            }
            Field::Scalar(_) | Field::CollectionLink(_) | Field::Object(_) => {}
        }
    }

    for child in &mut item.children {
        normalize_item(base_url, child, registry);
    }
}

fn normalize_image(base_url: &str, image: &mut ImageField, registry: &mut Registry) {
    let Some(path) = image.path.as_deref() else {
        return;
    };
    let url = absolutize(base_url, path);
    registry.insert_image(&url);
    image.path = Some(url);
}

fn normalize_gallery(base_url: &str, gallery: &mut GalleryField, registry: &mut Registry) {
    for image in &mut gallery.images {
        if image.path.is_none() {
            continue;
        }
        if let Some(serde_json::Value::Object(meta)) = image.attributes.get_mut("meta") {
            meta.remove("asset");
        }
        normalize_image(base_url, image, registry);
    }
}

/// Returns false when the asset carries no path to register
fn normalize_asset(base_url: &str, asset: &mut AssetField, registry: &mut Registry) -> bool {
    for attribute in ASSET_INTERNAL_ATTRIBUTES {
        asset.attributes.remove(*attribute);
    }

    let Some(path) = asset.path.as_deref() else {
        return false;
    };
    let url = asset_url(base_url, path);
    registry.insert_asset(&url);
    asset.path = Some(url);
    true
}

fn has_scheme(path: &str) -> bool {
    match path.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Resolve a path against the CMS base URL
pub fn absolutize(base_url: &str, path: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    if has_scheme(path) {
        path.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base_url, path)
    } else {
        format!("{}/{}", base_url, path)
    }
}

/// Public URL of an uploaded asset
pub fn asset_url(base_url: &str, path: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    if has_scheme(path) {
        path.to_string()
    } else if path.starts_with('/') {
        format!("{}{}{}", base_url, UPLOADS_PATH, path)
    } else {
        format!("{}{}/{}", base_url, UPLOADS_PATH, path)
    }
}
