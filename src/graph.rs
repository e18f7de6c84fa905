//! In-memory node store.
//!
//! A small host-side graph used by the CLI and tests: it materializes
//! registry entries and `object` values as nodes, then turns linked
//! forests into item nodes with parent/child edges.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::content::{ContentForest, ContentItem, SourceKind};
use crate::ids::{
    content_hash, generate_node_id, hash_text, pascal_case, record_node_id, NodeId, TYPE_PREFIX,
};
use crate::link::ObjectNodeFactory;
use crate::normalize::{Materializer, PendingResource, ResourceKind};

/// One node of the graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    /// Digest of `data`, lets consumers skip unchanged nodes
    pub content_digest: String,
    pub data: Value,
}

impl Node {
    fn new(id: NodeId, node_type: String, data: Value) -> Self {
        Self {
            id,
            node_type,
            parent: None,
            children: Vec::new(),
            content_digest: content_hash(&data),
            data,
        }
    }
}

/// Node store keyed by node id
#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes of one type, e.g. `CockpitImage`
    pub fn nodes_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |node| node.node_type == node_type)
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Add item nodes for a linked forest. Node ids match the ones
    /// collection links resolve to.
    pub fn add_forest(&mut self, forest: &ContentForest) {
        let node_type = format!("{}{}", TYPE_PREFIX, pascal_case(&forest.published_name));
        for item in &forest.items {
            self.add_item(forest, &node_type, item, None);
        }
    }

    fn add_item(
        &mut self,
        forest: &ContentForest,
        node_type: &str,
        item: &ContentItem,
        parent: Option<&NodeId>,
    ) -> NodeId {
        let id = record_node_id(&forest.name, &item.id, &item.locale);

        let mut data = Map::new();
        data.insert("cockpitId".to_string(), json!(item.id));
        data.insert("lang".to_string(), json!(item.locale.as_str()));
        data.insert("cockpitCreated".to_string(), json!(item.created_at));
        data.insert("cockpitModified".to_string(), json!(item.modified_at));
        data.insert("cockpitBy".to_string(), json!(item.last_touched_by));
        data.insert("cockpitCreatedBy".to_string(), json!(item.created_by));
        data.insert("cockpitModifiedBy".to_string(), json!(item.modified_by));
        match forest.kind {
            SourceKind::Collection => {
                data.insert("level".to_string(), json!(item.depth));
            }
            SourceKind::Tree => {
                data.insert("parentId".to_string(), json!(item.parent_id));
            }
        }
        for (name, field) in &item.fields {
            data.insert(name.clone(), field.to_json());
        }

        let mut node = Node::new(id.clone(), node_type.to_string(), Value::Object(data));
        node.parent = parent.cloned();
        node.children = item
            .children
            .iter()
            .map(|child| self.add_item(forest, node_type, child, Some(&id)))
            .collect();

        self.insert(node)
    }
}

fn resource_type(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Image => "Image",
        ResourceKind::Asset => "Asset",
        ResourceKind::Markdown => "Markdown",
        ResourceKind::Layout => "Layout",
    }
}

impl Materializer for Graph {
    fn materialize(&mut self, resource: PendingResource<'_>) -> anyhow::Result<Option<NodeId>> {
        let type_name = resource_type(resource.kind);
        let key = match resource.kind {
            ResourceKind::Layout => resource.key.to_string(),
            _ => hash_text(resource.key),
        };
        let id = generate_node_id(type_name, &key);

        let data = match resource.kind {
            ResourceKind::Image | ResourceKind::Asset => json!({"url": resource.value}),
            ResourceKind::Markdown => json!({"raw": resource.value}),
            ResourceKind::Layout => json!({"layout": resource.value}),
        };

        let node = Node::new(id, format!("{}{}", TYPE_PREFIX, type_name), data);
        Ok(Some(self.insert(node)))
    }
}

impl ObjectNodeFactory for Graph {
    fn create_object_node(&mut self, value: &Value) -> anyhow::Result<NodeId> {
        let id = generate_node_id("Object", &content_hash(value));
        let node = Node::new(id, format!("{}Object", TYPE_PREFIX), json!({"data": value}));
        Ok(self.insert(node))
    }
}
