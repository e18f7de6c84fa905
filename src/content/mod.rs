//! Content model: typed fields and the items that carry them.

pub mod field;
pub mod item;

pub use field::{
    AssetField, CollectionLinkField, Field, FieldType, GalleryField, ImageField, LayoutField,
    LinkTargets, LinkedNodes, MarkdownField, ObjectField, RecordLink, NODE_REF_KEY,
};
pub use item::{ContentForest, ContentItem, SourceKind, CHILDREN_KEY};
