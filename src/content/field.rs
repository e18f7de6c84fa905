//! Typed content fields.
//!
//! A raw CMS value is either a bare scalar or a composite (mapping, or
//! array containing mappings). Composites are classified into one of the
//! closed set of field kinds below; the normalizer and linker match on
//! them exhaustively.
//!
//! Absence is the only "no value": `null`, `""` and `[]` produce no field.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::ids::NodeId;

/// Key under which a linked field exposes its foreign-key reference
pub const NODE_REF_KEY: &str = "value___NODE";

/// Cockpit asset kinds that are treated as `asset` fields
const ASSET_KINDS: &[&str] = &["asset", "video", "audio", "document", "archive", "code", "file"];

/// Type tag of a composite field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Image,
    Gallery,
    Asset,
    Markdown,
    Layout,
    LayoutGrid,
    CollectionLink,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Image => "image",
            FieldType::Gallery => "gallery",
            FieldType::Asset => "asset",
            FieldType::Markdown => "markdown",
            FieldType::Layout => "layout",
            FieldType::LayoutGrid => "layout-grid",
            FieldType::CollectionLink => "collectionlink",
            FieldType::Object => "object",
        }
    }

    /// Parse a CMS type tag. Asset kinds (`video`, `document`, ...) map to `Asset`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "image" => Some(FieldType::Image),
            "gallery" => Some(FieldType::Gallery),
            "markdown" => Some(FieldType::Markdown),
            "layout" => Some(FieldType::Layout),
            "layout-grid" => Some(FieldType::LayoutGrid),
            "collectionlink" => Some(FieldType::CollectionLink),
            "object" => Some(FieldType::Object),
            tag if ASSET_KINDS.contains(&tag) => Some(FieldType::Asset),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single image reference
#[derive(Debug, Clone, PartialEq)]
pub struct ImageField {
    /// Raw path, absolute URL after normalization, `None` once linked or unresolved
    pub path: Option<String>,
    /// Remaining attributes of the raw image object (`meta`, `title`, ...)
    pub attributes: Map<String, Value>,
    pub node: Option<NodeId>,
}

impl ImageField {
    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            attributes: Map::new(),
            node: None,
        }
    }

    fn from_object(mut object: Map<String, Value>) -> Self {
        let path = take_string(&mut object, "path");
        object.remove("type");
        Self {
            path,
            attributes: object,
            node: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryField {
    pub images: Vec<ImageField>,
    /// Resolved image nodes, unresolved entries dropped
    pub nodes: Option<Vec<NodeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetField {
    /// Raw storage path, absolute URL after normalization
    pub path: Option<String>,
    /// Raw attributes; after normalization only the hoisted, non-internal ones remain
    pub attributes: Map<String, Value>,
    pub node: Option<NodeId>,
}

impl AssetField {
    fn from_object(mut object: Map<String, Value>) -> Self {
        let path = take_string(&mut object, "path");
        object.remove("type");
        Self {
            path,
            attributes: object,
            node: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownField {
    pub text: String,
    pub node: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutField {
    /// `layout-grid` rather than `layout`
    pub grid: bool,
    pub value: Value,
    pub node: Option<NodeId>,
}

/// One target of a collection link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLink {
    pub collection: String,
    pub id: String,
}

impl RecordLink {
    /// Accepts both `{_id, link}` and `{_id, _model}` shapes
    fn from_object(object: &Map<String, Value>) -> Option<Self> {
        let id = object.get("_id")?.as_str()?;
        let collection = object
            .get("link")
            .or_else(|| object.get("_model"))?
            .as_str()?;
        Some(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTargets {
    One(RecordLink),
    Many(Vec<RecordLink>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedNodes {
    One(NodeId),
    Many(Vec<NodeId>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionLinkField {
    pub targets: LinkTargets,
    pub nodes: Option<LinkedNodes>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub value: Value,
    pub node: Option<NodeId>,
}

/// A named, typed value attached to a content item
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// String, number, bool or array of those, stored as-is
    Scalar(Value),
    Image(ImageField),
    Gallery(GalleryField),
    Asset(AssetField),
    Markdown(MarkdownField),
    Layout(LayoutField),
    CollectionLink(CollectionLinkField),
    Object(ObjectField),
}

/// `null`, `""` and `[]` carry no value
pub fn is_absent(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_composite(raw: &Value) -> bool {
    match raw {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

impl Field {
    /// Apply the field-wrapping rule to a raw value
    pub fn from_raw(raw: &Value) -> Option<Field> {
        if is_absent(raw) {
            return None;
        }
        if !is_composite(raw) {
            return Some(Field::Scalar(raw.clone()));
        }

        match raw {
            Value::Object(object) => Some(classify_object(object)),
            Value::Array(items) => Some(classify_array(items)),
            _ => Some(Field::Scalar(raw.clone())),
        }
    }

    /// Build a field from an explicit type tag and its value. An empty
    /// value still yields a field of that type with nothing to reference.
    pub fn from_tagged(field_type: FieldType, value: &Value) -> Field {
        match (field_type, value) {
            (FieldType::Image, value) if is_absent(value) => Field::Image(ImageField {
                path: None,
                attributes: Map::new(),
                node: None,
            }),
            (FieldType::Image, Value::String(path)) => {
                Field::Image(ImageField::from_path(path.clone()))
            }
            (FieldType::Image, Value::Object(object)) => {
                Field::Image(ImageField::from_object(object.clone()))
            }
            (FieldType::Gallery, value) if is_absent(value) => Field::Gallery(GalleryField {
                images: Vec::new(),
                nodes: None,
            }),
            (FieldType::Gallery, Value::Array(items)) => Field::Gallery(GalleryField {
                images: items.iter().filter_map(gallery_image).collect(),
                nodes: None,
            }),
            (FieldType::Asset, value) if is_absent(value) => Field::Asset(AssetField {
                path: None,
                attributes: Map::new(),
                node: None,
            }),
            (FieldType::Asset, Value::String(path)) => Field::Asset(AssetField {
                path: Some(path.clone()),
                attributes: Map::new(),
                node: None,
            }),
            (FieldType::Asset, Value::Object(object)) => {
                Field::Asset(AssetField::from_object(object.clone()))
            }
            (FieldType::Markdown, value) if is_absent(value) => Field::Markdown(MarkdownField {
                text: String::new(),
                node: None,
            }),
            (FieldType::Markdown, Value::String(text)) => Field::Markdown(MarkdownField {
                text: text.clone(),
                node: None,
            }),
            (FieldType::Layout, value) | (FieldType::LayoutGrid, value) => {
                Field::Layout(LayoutField {
                    grid: field_type == FieldType::LayoutGrid,
                    value: value.clone(),
                    node: None,
                })
            }
            (FieldType::CollectionLink, value) if is_absent(value) => {
                Field::CollectionLink(CollectionLinkField {
                    targets: LinkTargets::Many(Vec::new()),
                    nodes: None,
                })
            }
            (FieldType::CollectionLink, value) => match parse_link_targets(value) {
                Some(targets) => Field::CollectionLink(CollectionLinkField {
                    targets,
                    nodes: None,
                }),
                None => Field::object(value.clone()),
            },
            (_, value) => Field::object(value.clone()),
        }
    }

    fn object(value: Value) -> Field {
        Field::Object(ObjectField { value, node: None })
    }

    /// Type tag, `None` for scalars
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Field::Scalar(_) => None,
            Field::Image(_) => Some(FieldType::Image),
            Field::Gallery(_) => Some(FieldType::Gallery),
            Field::Asset(_) => Some(FieldType::Asset),
            Field::Markdown(_) => Some(FieldType::Markdown),
            Field::Layout(layout) if layout.grid => Some(FieldType::LayoutGrid),
            Field::Layout(_) => Some(FieldType::Layout),
            Field::CollectionLink(_) => Some(FieldType::CollectionLink),
            Field::Object(_) => Some(FieldType::Object),
        }
    }

    /// Render the field the way downstream graph consumers read it
    pub fn to_json(&self) -> Value {
        let field_type = match (self, self.field_type()) {
            (Field::Scalar(value), _) => return value.clone(),
            (_, Some(field_type)) => field_type,
            (_, None) => return Value::Null,
        };

        let mut out = Map::new();

        match self {
            Field::Scalar(_) => {}
            Field::Image(image) => {
                out.extend(image.attributes.clone());
                insert_value_or_ref(&mut out, json!(image.path), image.node.as_ref());
            }
            Field::Gallery(gallery) => match &gallery.nodes {
                Some(nodes) => {
                    out.insert(NODE_REF_KEY.to_string(), json!(nodes));
                }
                None => {
                    let images: Vec<Value> = gallery
                        .images
                        .iter()
                        .map(|image| Field::Image(image.clone()).to_json())
                        .collect();
                    out.insert("value".to_string(), Value::Array(images));
                }
            },
            Field::Asset(asset) => {
                out.extend(asset.attributes.clone());
                insert_value_or_ref(&mut out, json!(asset.path), asset.node.as_ref());
            }
            Field::Markdown(markdown) => {
                insert_value_or_ref(&mut out, json!(markdown.text), markdown.node.as_ref());
            }
            Field::Layout(layout) => {
                insert_value_or_ref(&mut out, layout.value.clone(), layout.node.as_ref());
            }
            Field::CollectionLink(link) => match &link.nodes {
                Some(LinkedNodes::One(node)) => {
                    out.insert(NODE_REF_KEY.to_string(), json!(node));
                }
                Some(LinkedNodes::Many(nodes)) => {
                    out.insert(NODE_REF_KEY.to_string(), json!(nodes));
                }
                None => {
                    out.insert("value".to_string(), link_targets_json(&link.targets));
                }
            },
            Field::Object(object) => {
                insert_value_or_ref(&mut out, object.value.clone(), object.node.as_ref());
            }
        }

        out.insert("type".to_string(), json!(field_type.as_str()));
        Value::Object(out)
    }
}

fn insert_value_or_ref(out: &mut Map<String, Value>, value: Value, node: Option<&NodeId>) {
    match node {
        Some(node) => {
            out.insert(NODE_REF_KEY.to_string(), json!(node));
        }
        None => {
            out.insert("value".to_string(), value);
        }
    }
}

fn link_targets_json(targets: &LinkTargets) -> Value {
    let one = |link: &RecordLink| json!({"_id": link.id, "link": link.collection});
    match targets {
        LinkTargets::One(link) => one(link),
        LinkTargets::Many(links) => Value::Array(links.iter().map(one).collect()),
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            object.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn type_tag(object: &Map<String, Value>) -> Option<&str> {
    object.get("type").and_then(Value::as_str)
}

fn looks_like_image(object: &Map<String, Value>) -> bool {
    if type_tag(object) == Some("image") {
        return true;
    }
    object.contains_key("path")
        && object
            .get("mime")
            .and_then(Value::as_str)
            .is_some_and(|mime| mime.starts_with("image/"))
}

/// Cockpit gallery entries carry a path and a `meta` block but no type or mime
fn looks_like_gallery_entry(object: &Map<String, Value>) -> bool {
    looks_like_image(object)
        || (object.get("path").is_some_and(Value::is_string)
            && object.get("meta").is_some_and(Value::is_object))
}

fn classify_object(object: &Map<String, Value>) -> Field {
    if let Some(field_type) = type_tag(object).and_then(FieldType::from_tag) {
        // Envelope form: {"type": "...", "value": ...}
        if let Some(inner) = object.get("value") {
            return Field::from_tagged(field_type, inner);
        }
        match field_type {
            FieldType::Image => return Field::Image(ImageField::from_object(object.clone())),
            FieldType::Asset if object.contains_key("path") => {
                return Field::Asset(AssetField::from_object(object.clone()))
            }
            _ => {}
        }
    }

    if looks_like_image(object) {
        Field::Image(ImageField::from_object(object.clone()))
    } else if object.contains_key("path") && object.contains_key("mime") {
        Field::Asset(AssetField::from_object(object.clone()))
    } else if let Some(link) = RecordLink::from_object(object) {
        Field::CollectionLink(CollectionLinkField {
            targets: LinkTargets::One(link),
            nodes: None,
        })
    } else {
        Field::object(Value::Object(object.clone()))
    }
}

fn classify_array(items: &[Value]) -> Field {
    let all_images = items
        .iter()
        .all(|item| item.as_object().is_some_and(looks_like_gallery_entry));
    if all_images {
        return Field::Gallery(GalleryField {
            images: items.iter().filter_map(gallery_image).collect(),
            nodes: None,
        });
    }

    let value = Value::Array(items.to_vec());
    match parse_link_targets(&value) {
        Some(targets) => Field::CollectionLink(CollectionLinkField {
            targets,
            nodes: None,
        }),
        None => Field::object(value),
    }
}

fn gallery_image(item: &Value) -> Option<ImageField> {
    match item {
        Value::String(path) => Some(ImageField::from_path(path.clone())),
        Value::Object(object) => Some(ImageField::from_object(object.clone())),
        _ => None,
    }
}

fn parse_link_targets(value: &Value) -> Option<LinkTargets> {
    match value {
        Value::Object(object) => RecordLink::from_object(object).map(LinkTargets::One),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_object().and_then(RecordLink::from_object))
            .collect::<Option<Vec<_>>>()
            .map(LinkTargets::Many),
        _ => None,
    }
}
