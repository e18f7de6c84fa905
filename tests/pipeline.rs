//! Sync Pipeline Integration Tests
//!
//! Full runs against an in-memory content source: fetch, normalize,
//! seal, link and node creation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cockpit_graph::adapters::{ContentSource, HealthError};
use cockpit_graph::config::{resolve, Aliases, ConfigFile, FetchErrorPolicy, ResolvedConfig};
use cockpit_graph::core::{PipelineError, SyncRunner, SyncSummary};
use cockpit_graph::graph::Graph;
use cockpit_graph::ids::{generate_node_id, hash_text, NodeId};
use serde_json::{json, Value};

const BASE_URL: &str = "https://cms.example";

#[derive(Default)]
struct MemorySource {
    collections: HashMap<String, Vec<Value>>,
    trees: HashMap<String, Vec<Value>>,
    reject_token: bool,
}

impl MemorySource {
    fn collection(mut self, name: &str, records: Vec<Value>) -> Self {
        self.collections.insert(name.to_string(), records);
        self
    }

    fn tree(mut self, name: &str, records: Vec<Value>) -> Self {
        self.trees.insert(name.to_string(), records);
        self
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_collection(&self, name: &str) -> anyhow::Result<Vec<Value>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404: collection {} not found", name))
    }

    async fn fetch_tree(&self, name: &str) -> anyhow::Result<Vec<Value>> {
        self.trees
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404: tree {} not found", name))
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        if self.reject_token {
            return Err(HealthError::TokenRejected(401));
        }
        Ok(())
    }
}

fn config(collections: &[&str], trees: &[&str], policy: FetchErrorPolicy) -> ResolvedConfig {
    let mut aliases = Aliases::default();
    aliases
        .collection
        .insert("posts".to_string(), "BlogPost".to_string());

    let file = ConfigFile {
        base_url: Some(BASE_URL.to_string()),
        token: Some("test-token".to_string()),
        collections: collections.iter().map(|s| s.to_string()).collect(),
        trees: trees.iter().map(|s| s.to_string()).collect(),
        aliases,
        on_fetch_error: policy,
        ..Default::default()
    };
    resolve(file, None, None, None).unwrap()
}

fn shared_layout() -> Value {
    json!([{"component": "text", "settings": {"text": "Hello"}}])
}

fn site() -> MemorySource {
    MemorySource::default()
        .collection(
            "posts",
            vec![
                json!({
                    "_id": "p1",
                    "_created": 1_700_000_000,
                    "_modified": 1_700_000_100,
                    "title": "First",
                    "cover": {"type": "image", "path": "/img/a.png", "title": "A"},
                    "body": {"type": "markdown", "value": "Intro ![inline](/img/b.png) and [spec](/files/spec.pdf)"},
                    "blocks": {"type": "layout", "value": shared_layout()},
                    "author": {"_id": "a1", "link": "authors"},
                    "tags": [{"_id": "t1", "link": "tags"}, {"_id": "t2", "link": "tags"}],
                    "meta": {"seo": {"robots": "index"}}
                }),
                json!({
                    "_id": "p2",
                    "title": "Second",
                    "blocks": {"type": "layout", "value": shared_layout()},
                    "draft": false
                }),
            ],
        )
        .collection("authors", vec![json!({"_id": "a1", "name": "Ada"})])
        .tree(
            "pages",
            vec![json!({
                "_id": "home",
                "title": "Home",
                "_children": [{"_id": "about", "_pid": "home", "title": "About"}]
            })],
        )
}

async fn sync(
    source: MemorySource,
    config: ResolvedConfig,
) -> (Result<SyncSummary, PipelineError>, Graph) {
    let runner = SyncRunner::new(config, Arc::new(source));
    let mut graph = Graph::new();
    let result = runner.run(&mut graph).await;
    (result, graph)
}

fn node_data<'a>(graph: &'a Graph, id: &str) -> &'a Value {
    &graph
        .get(&NodeId::new(id))
        .unwrap_or_else(|| panic!("missing node {}", id))
        .data
}

#[tokio::test]
async fn test_full_sync_links_every_field() {
    let (result, graph) = sync(
        site(),
        config(&["posts", "authors"], &["pages"], FetchErrorPolicy::Skip),
    )
    .await;
    let summary = result.unwrap();

    assert_eq!(summary.forests, 3);
    assert_eq!(summary.items, 5);
    assert_eq!(summary.resources.images, 2);
    assert_eq!(summary.resources.assets, 1);
    assert_eq!(summary.resources.markdowns, 1);
    assert_eq!(summary.resources.layouts, 1);
    assert_eq!(summary.missing_media, 0);
    assert!(summary.failed_sources.is_empty());

    // Aliased collection: node type follows the alias, ids follow the CMS name
    let post = node_data(&graph, "Cockpit__Posts__p1");
    assert_eq!(
        graph.get(&NodeId::new("Cockpit__Posts__p1")).unwrap().node_type,
        "CockpitBlogPost"
    );
    assert_eq!(post["title"], json!("First"));
    assert_eq!(post["cockpitId"], json!("p1"));

    let image_id = generate_node_id("Image", &hash_text("https://cms.example/img/a.png"));
    assert_eq!(post["cover"]["value___NODE"], json!(image_id));
    assert_eq!(post["cover"]["title"], json!("A"));
    assert_eq!(post["cover"]["type"], json!("image"));
    assert_eq!(
        node_data(&graph, image_id.as_str())["url"],
        json!("https://cms.example/img/a.png")
    );

    assert_eq!(post["author"]["value___NODE"], json!("Cockpit__Authors__a1"));
    assert_eq!(
        post["tags"]["value___NODE"],
        json!(["Cockpit__Tags__t1", "Cockpit__Tags__t2"])
    );

    let object_ref = post["meta"]["value___NODE"].as_str().unwrap();
    assert_eq!(
        node_data(&graph, object_ref)["data"],
        json!({"seo": {"robots": "index"}})
    );

    // Referenced author exists under the id the link resolved to
    assert_eq!(node_data(&graph, "Cockpit__Authors__a1")["name"], json!("Ada"));
}

#[tokio::test]
async fn test_identical_layouts_share_one_node() {
    let (result, graph) = sync(site(), config(&["posts"], &[], FetchErrorPolicy::Skip)).await;
    result.unwrap();

    let first = &node_data(&graph, "Cockpit__Posts__p1")["blocks"]["value___NODE"];
    let second = &node_data(&graph, "Cockpit__Posts__p2")["blocks"]["value___NODE"];
    assert_eq!(first, second);
    assert_eq!(graph.nodes_of_type("CockpitLayout").count(), 1);
}

#[tokio::test]
async fn test_markdown_media_become_nodes() {
    let (result, graph) = sync(site(), config(&["posts"], &[], FetchErrorPolicy::Skip)).await;
    result.unwrap();

    let inline = generate_node_id("Image", &hash_text("https://cms.example/img/b.png"));
    let attachment = generate_node_id("Asset", &hash_text("https://cms.example/files/spec.pdf"));
    assert!(graph.get(&inline).is_some());
    assert!(graph.get(&attachment).is_some());

    let markdown_ref = node_data(&graph, "Cockpit__Posts__p1")["body"]["value___NODE"]
        .as_str()
        .unwrap();
    assert!(node_data(&graph, markdown_ref)["raw"]
        .as_str()
        .unwrap()
        .contains("![inline](/img/b.png)"));
}

#[tokio::test]
async fn test_tree_items_keep_hierarchy() {
    let (result, graph) = sync(site(), config(&[], &["pages"], FetchErrorPolicy::Skip)).await;
    result.unwrap();

    let home = graph.get(&NodeId::new("Cockpit__Pages__home")).unwrap();
    let about = graph.get(&NodeId::new("Cockpit__Pages__about")).unwrap();
    assert_eq!(home.children, vec![about.id.clone()]);
    assert_eq!(about.parent.as_ref(), Some(&home.id));
    assert_eq!(about.data["parentId"], json!("home"));
}

#[tokio::test]
async fn test_mixed_collection_links_fail_the_run() {
    let source = MemorySource::default().collection(
        "posts",
        vec![json!({
            "_id": "p1",
            "related": [{"_id": "a1", "link": "authors"}, {"_id": "t1", "link": "tags"}]
        })],
    );

    let (result, _) = sync(source, config(&["posts"], &[], FetchErrorPolicy::Skip)).await;
    let err = result.unwrap_err();

    assert!(matches!(err, PipelineError::Link(_)));
    let message = err.to_string();
    assert!(message.contains("single collection"));
    assert!(message.contains("authors"));
    assert!(message.contains("tags"));
}

#[tokio::test]
async fn test_failed_fetch_is_skipped_by_default() {
    let (result, graph) = sync(
        site(),
        config(&["posts", "missing"], &[], FetchErrorPolicy::Skip),
    )
    .await;
    let summary = result.unwrap();

    assert_eq!(summary.forests, 1);
    assert_eq!(summary.failed_sources.len(), 1);
    assert!(summary.failed_sources[0].contains("missing"));
    assert!(graph.get(&NodeId::new("Cockpit__Posts__p1")).is_some());
}

#[tokio::test]
async fn test_failed_fetch_aborts_when_configured() {
    let (result, graph) = sync(
        site(),
        config(&["posts", "missing"], &[], FetchErrorPolicy::Abort),
    )
    .await;

    assert!(matches!(result, Err(PipelineError::Fetch(_))));
    assert!(graph.is_empty());
}

#[tokio::test]
async fn test_rejected_token_stops_before_fetch() {
    let source = MemorySource {
        reject_token: true,
        ..site()
    };

    let (result, graph) = sync(source, config(&["posts"], &[], FetchErrorPolicy::Skip)).await;

    match result {
        Err(PipelineError::Health(HealthError::TokenRejected(401))) => {}
        other => panic!("expected rejected token, got {:?}", other.map(|s| s.run_id)),
    }
    assert!(graph.is_empty());
}
