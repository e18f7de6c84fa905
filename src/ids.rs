//! Deterministic identifiers.
//!
//! Two families of ids live here:
//! - Node ids: `Cockpit__{Type}__{key}`, derived from a type name and a
//!   natural key (record id plus optional locale). Same input, same id,
//!   in every run.
//! - Content hashes: SHA256 over a canonical JSON rendering, truncated to
//!   8 bytes (16 hex chars). Used as the dedup key for values that have no
//!   natural address, like layout blocks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Prefix shared by every generated node id and node type
pub const TYPE_PREFIX: &str = "Cockpit";

/// Identifier of a materialized node, usable as a foreign key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an identifier assigned by an external node store
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Locale a content item was fetched in
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locale {
    /// The wildcard locale: natural keys carry no suffix
    #[default]
    Any,
    Tag(String),
}

impl Locale {
    pub fn new(tag: &str) -> Self {
        let tag = tag.trim();
        if tag.is_empty() || tag == "any" {
            Locale::Any
        } else {
            Locale::Tag(tag.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locale::Any => "any",
            Locale::Tag(tag) => tag,
        }
    }
}

impl From<String> for Locale {
    fn from(tag: String) -> Self {
        Locale::new(&tag)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.as_str().to_string()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Natural key of a record: its id, suffixed with the locale unless `any`
pub fn natural_key(record_id: &str, locale: &Locale) -> String {
    match locale {
        Locale::Any => record_id.to_string(),
        Locale::Tag(tag) => format!("{}_{}", record_id, tag),
    }
}

/// Generate the node id for a logical type and natural key
pub fn generate_node_id(type_name: &str, natural_key: &str) -> NodeId {
    NodeId(format!(
        "{}__{}__{}",
        TYPE_PREFIX,
        pascal_case(type_name),
        natural_key
    ))
}

/// Node id of a CMS record in a given collection or tree
pub fn record_node_id(type_name: &str, record_id: &str, locale: &Locale) -> NodeId {
    generate_node_id(type_name, &natural_key(record_id, locale))
}

/// `blog-posts` -> `BlogPosts`, `layout_grid` -> `LayoutGrid`
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render a value as JSON with object keys in sorted order
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Fixed-width hash of a structured value's canonical JSON
pub fn content_hash(value: &Value) -> String {
    hash_text(&canonical_json(value))
}

/// Fixed-width hash of raw text (SHA256, first 8 bytes as hex)
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_id_is_stable() {
        let a = generate_node_id("posts", "abc");
        let b = generate_node_id("posts", "abc");

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Cockpit__Posts__abc");
    }

    #[test]
    fn test_locale_suffix() {
        assert_eq!(natural_key("abc", &Locale::Any), "abc");
        assert_eq!(natural_key("abc", &Locale::new("de")), "abc_de");
        assert_eq!(Locale::new("any"), Locale::Any);
        assert_eq!(Locale::new(""), Locale::Any);

        let any = record_node_id("posts", "abc", &Locale::Any);
        let de = record_node_id("posts", "abc", &Locale::new("de"));
        assert_ne!(any, de);
        assert_eq!(de.as_str(), "Cockpit__Posts__abc_de");
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("blog-posts"), "BlogPosts");
        assert_eq!(pascal_case("layout_grid"), "LayoutGrid");
        assert_eq!(pascal_case("Image"), "Image");
        assert_eq!(pascal_case(""), "");
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a = json!({"component": "text", "settings": {"a": 1, "b": [1, 2]}});
        let b = json!({"settings": {"b": [1, 2], "a": 1}, "component": "text"});
        let c = json!({"component": "text", "settings": {"a": 2, "b": [1, 2]}});

        assert_eq!(content_hash(&a), content_hash(&b));
        assert_ne!(content_hash(&a), content_hash(&c));
        assert_eq!(content_hash(&a).len(), 16);
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(content_hash(&json!([1, 2])), content_hash(&json!([2, 1])));
    }
}
