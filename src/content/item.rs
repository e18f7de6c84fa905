//! Content items and the tree builder.
//!
//! Collections are flat: one item per record, nested children are not
//! followed. Trees recurse through the reserved `_children` key and keep
//! the resulting items in order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::ids::Locale;

use super::field::Field;

/// Reserved raw key holding a tree record's children
pub const CHILDREN_KEY: &str = "_children";

/// Raw keys that populate item metadata instead of fields
const METADATA_KEYS: &[&str] = &["_id", "_created", "_modified", "_by", "_cby", "_mby", "_pid"];

/// Kind of CMS source a forest was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Collection,
    Tree,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Collection => write!(f, "collection"),
            SourceKind::Tree => write!(f, "tree"),
        }
    }
}

/// One CMS record (collection entry or tree node)
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItem {
    /// CMS-assigned record id
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    // TODO: resolve user references to user nodes once users are fetched
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
    pub last_touched_by: Option<String>,
    /// Immediate parent in a tree (tree items only)
    pub parent_id: Option<String>,
    /// 1-based nesting level (collection items only)
    pub depth: Option<u32>,
    pub locale: Locale,
    pub fields: BTreeMap<String, Field>,
    /// Ordered children (tree items only)
    pub children: Vec<ContentItem>,
}

impl ContentItem {
    /// Number of items in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(ContentItem::subtree_len).sum::<usize>()
    }
}

/// All items fetched for one collection or tree name
#[derive(Debug, Clone, PartialEq)]
pub struct ContentForest {
    pub kind: SourceKind,
    /// Name in the CMS; used for node identity and link resolution
    pub name: String,
    /// Alias under which the forest is published (defaults to `name`)
    pub published_name: String,
    pub items: Vec<ContentItem>,
}

impl ContentForest {
    /// Build a forest from the raw records of one fetch
    pub fn build(
        kind: SourceKind,
        name: &str,
        published_name: &str,
        records: &[Value],
        locale: &Locale,
    ) -> Self {
        let items = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let Some(record) = record.as_object() else {
                    warn!(%kind, name, index, "Skipping record that is not an object");
                    return None;
                };
                match kind {
                    SourceKind::Collection => build_collection_item(name, record, locale),
                    SourceKind::Tree => build_tree_item(name, record, locale),
                }
            })
            .collect();

        Self {
            kind,
            name: name.to_string(),
            published_name: published_name.to_string(),
            items,
        }
    }

    /// Number of items across all trees of the forest
    pub fn item_count(&self) -> usize {
        self.items.iter().map(ContentItem::subtree_len).sum()
    }
}

/// Build a collection item. Returns `None` for records without an `_id`.
pub fn build_collection_item(
    collection: &str,
    record: &Map<String, Value>,
    locale: &Locale,
) -> Option<ContentItem> {
    let mut item = item_metadata(collection, record, locale)?;
    item.depth = Some(1);

    for (name, raw) in record {
        if METADATA_KEYS.contains(&name.as_str()) {
            continue;
        }
        if let Some(field) = Field::from_raw(raw) {
            item.fields.insert(name.clone(), field);
        }
    }

    Some(item)
}

/// Build a tree item and, recursively, its children
pub fn build_tree_item(
    tree: &str,
    record: &Map<String, Value>,
    locale: &Locale,
) -> Option<ContentItem> {
    let mut item = item_metadata(tree, record, locale)?;
    item.parent_id = string_attr(record, "_pid");

    for (name, raw) in record {
        if METADATA_KEYS.contains(&name.as_str()) {
            continue;
        }
        if name == CHILDREN_KEY {
            if let Value::Array(children) = raw {
                item.children = children
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|child| build_tree_item(tree, child, locale))
                    .collect();
            }
            continue;
        }
        if let Some(field) = Field::from_raw(raw) {
            item.fields.insert(name.clone(), field);
        }
    }

    Some(item)
}

fn item_metadata(
    source: &str,
    record: &Map<String, Value>,
    locale: &Locale,
) -> Option<ContentItem> {
    let Some(id) = string_attr(record, "_id") else {
        warn!(source, "Skipping record without _id");
        return None;
    };

    Some(ContentItem {
        id,
        created_at: timestamp_attr(record, "_created"),
        modified_at: timestamp_attr(record, "_modified"),
        created_by: string_attr(record, "_cby"),
        modified_by: string_attr(record, "_mby"),
        last_touched_by: string_attr(record, "_by"),
        parent_id: None,
        depth: None,
        locale: locale.clone(),
        fields: BTreeMap::new(),
        children: Vec::new(),
    })
}

fn string_attr(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Epoch seconds to UTC
fn timestamp_attr(record: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let seconds = record.get(key)?.as_f64()?;
    Utc.timestamp_opt(seconds.trunc() as i64, 0).single()
}
