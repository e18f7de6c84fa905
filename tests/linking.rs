//! Normalize/Link Integration Tests
//!
//! Registry behavior across passes and the linker's miss policy.

use cockpit_graph::content::{ContentForest, Field, SourceKind};
use cockpit_graph::graph::Graph;
use cockpit_graph::ids::Locale;
use cockpit_graph::link::{link_all, LinkError};
use cockpit_graph::normalize::{normalize_all, Registry, ResourceKind};
use serde_json::{json, Value};

const BASE_URL: &str = "https://cms.example";

fn forest(name: &str, records: Vec<Value>) -> ContentForest {
    ContentForest::build(SourceKind::Collection, name, name, &records, &Locale::Any)
}

fn keys(registry: &Registry) -> Vec<(ResourceKind, Vec<String>)> {
    ResourceKind::ALL
        .iter()
        .map(|kind| {
            (
                *kind,
                registry.keys(*kind).map(str::to_string).collect::<Vec<_>>(),
            )
        })
        .collect()
}

#[test]
fn test_image_is_registered_under_absolute_url() {
    let mut forests = vec![forest(
        "posts",
        vec![json!({"_id": "p1", "cover": {"type": "image", "path": "/img/a.png"}})],
    )];

    let registry = normalize_all(BASE_URL, &mut forests);

    assert!(registry.contains(ResourceKind::Image, "https://cms.example/img/a.png"));
    match &forests[0].items[0].fields["cover"] {
        Field::Image(image) => {
            assert_eq!(image.path.as_deref(), Some("https://cms.example/img/a.png"))
        }
        other => panic!("expected image, got {:?}", other),
    }
}

#[test]
fn test_second_normalization_leaves_registry_unchanged() {
    let mut forests = vec![forest(
        "posts",
        vec![json!({
            "_id": "p1",
            "cover": {"type": "image", "path": "img/a.png"},
            "file": {"type": "asset", "path": "/2024/doc.pdf", "mime": "application/pdf", "title": "Doc"},
            "body": {"type": "markdown", "value": "![x](https://cdn.example/x.jpg)"},
            "grid": {"type": "layout-grid", "value": [{"columns": []}]}
        })],
    )];

    let first = normalize_all(BASE_URL, &mut forests);
    let second = normalize_all(BASE_URL, &mut forests);

    assert_eq!(keys(&first), keys(&second));
    assert_eq!(first.stats(), second.stats());
    assert!(first.contains(
        ResourceKind::Asset,
        "https://cms.example/storage/uploads/2024/doc.pdf"
    ));
    assert!(first.contains(ResourceKind::Image, "https://cdn.example/x.jpg"));
}

#[test]
fn test_missing_image_links_to_null() {
    let mut forests = vec![forest(
        "posts",
        vec![json!({
            "_id": "p1",
            "cover": {"type": "image", "path": "https://cms.example/lost.png"}
        })],
    )];

    // Nothing was registered: the sealed registry knows no image
    let mut graph = Graph::new();
    let sealed = Registry::new().seal(&mut graph).unwrap();
    let stats = link_all(&sealed, &mut graph, &mut forests).unwrap();

    assert_eq!(stats.missing_media, 1);
    let cover = forests[0].items[0].fields["cover"].to_json();
    assert_eq!(cover, json!({"value": null, "type": "image"}));
}

#[test]
fn test_missing_markdown_is_fatal() {
    let mut forests = vec![forest(
        "posts",
        vec![json!({"_id": "p1", "body": {"type": "markdown", "value": "# Title"}})],
    )];

    let mut graph = Graph::new();
    let sealed = Registry::new().seal(&mut graph).unwrap();
    let err = link_all(&sealed, &mut graph, &mut forests).unwrap_err();

    match err {
        LinkError::Unregistered { kind, item, field, .. } => {
            assert_eq!(kind, ResourceKind::Markdown);
            assert_eq!(item, "p1");
            assert_eq!(field, "body");
        }
        other => panic!("expected unregistered markdown, got {}", other),
    }
}

#[test]
fn test_empty_envelope_values_still_link() {
    let mut forests = vec![forest(
        "posts",
        vec![json!({
            "_id": "p1",
            "body": {"type": "markdown", "value": ""},
            "photos": [
                {"path": "/a.png", "meta": {"title": "A", "asset": "x1"}},
                {"path": "/b.png", "meta": {"title": "B", "asset": "x2"}}
            ]
        })],
    )];

    let mut graph = Graph::new();
    let sealed = normalize_all(BASE_URL, &mut forests).seal(&mut graph).unwrap();
    let stats = link_all(&sealed, &mut graph, &mut forests).unwrap();

    assert_eq!(stats.missing_media, 0);
    let item = &forests[0].items[0];
    assert!(item.fields["body"].to_json()["value___NODE"].is_string());
    assert_eq!(
        item.fields["photos"].to_json()["value___NODE"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
    assert_eq!(graph.nodes_of_type("CockpitImage").count(), 2);
    assert!(graph.nodes_of_type("CockpitObject").next().is_none());
}

#[test]
fn test_one_to_many_links_in_one_collection() {
    let mut forests = vec![forest(
        "posts",
        vec![json!({
            "_id": "p1",
            "authors": [{"_id": "a1", "link": "authors"}, {"_id": "a2", "link": "authors"}]
        })],
    )];

    let mut graph = Graph::new();
    let sealed = normalize_all(BASE_URL, &mut forests).seal(&mut graph).unwrap();
    link_all(&sealed, &mut graph, &mut forests).unwrap();

    let authors = forests[0].items[0].fields["authors"].to_json();
    assert_eq!(
        authors["value___NODE"],
        json!(["Cockpit__Authors__a1", "Cockpit__Authors__a2"])
    );
}

#[test]
fn test_resources_are_materialized_once_across_forests() {
    let record =
        |id: &str| json!({"_id": id, "cover": {"type": "image", "path": "/img/shared.png"}});
    let mut forests = vec![
        forest("posts", vec![record("p1"), record("p2")]),
        forest("pages", vec![record("home")]),
    ];

    let mut graph = Graph::new();
    let sealed = normalize_all(BASE_URL, &mut forests).seal(&mut graph).unwrap();
    link_all(&sealed, &mut graph, &mut forests).unwrap();

    assert_eq!(graph.nodes_of_type("CockpitImage").count(), 1);
    let refs: Vec<Value> = forests
        .iter()
        .flat_map(|forest| forest.items.iter())
        .map(|item| item.fields["cover"].to_json()["value___NODE"].clone())
        .collect();
    assert_eq!(refs.len(), 3);
    assert!(refs.iter().all(|r| *r == refs[0] && !r.is_null()));
}
