use std::sync::Arc;

use marksync_primitives::command::Command;
use marksync_primitives::node::{Attributes, NodeKind};
use serde_json::json;
use tempdir::TempDir;

use super::*;
use crate::tests::common::*;

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = TempDir::new("marksync-baseline").unwrap();
    let path = dir.path().join("baseline.json");
    let mut nodeset = sample_tree();
    nodeset.set_revision(3);

    nodeset.save(&path).await.unwrap();
    let loaded = Nodeset::load(&path).await.unwrap();

    assert_eq!(loaded.revision(), 3);
    assert_eq!(loaded.version(), Some(BASELINE_VERSION));
    assert_eq!(loaded.preorder(&NodeId::root()), nodeset.preorder(&NodeId::root()));
    assert_eq!(loaded.get(&id("b2")).unwrap(), nodeset.get(&id("b2")).unwrap());
    assert_eq!(loaded.toolbar_id(), Some(id("tb")));
    assert!(!path.with_extension("json.tmp").exists(), "temp file is renamed away");
}

#[tokio::test]
async fn clones_must_be_decloned_first() {
    let dir = TempDir::new("marksync-baseline").unwrap();
    let path = dir.path().join("baseline.json");
    let mut clone = Nodeset::clone_of(Arc::new(sample_tree()));

    let err = clone.save(&path).await.unwrap_err();
    assert!(matches!(err, NodesetError::StillCloned), "got {err}");
    assert!(!path.exists());

    clone.declone().await.unwrap();
    clone.save(&path).await.unwrap();
    assert_eq!(Nodeset::load(&path).await.unwrap().len(), 7);
}

#[test]
fn only_reachable_nodes_are_written() {
    let mut nodeset = sample_tree();
    let mut stray = Node::bookmark("stray", "Stray", "http://stray");
    stray.parent_id = Some(id("nowhere"));
    nodeset.add_node(stray);

    let loaded = Nodeset::from_json(&nodeset.to_json().unwrap()).unwrap();

    assert_eq!(loaded.len(), 7);
    assert!(!loaded.contains(&id("stray")));
}

#[test]
fn document_layout() {
    let json: serde_json::Value = serde_json::from_str(&sample_tree().to_json().unwrap()).unwrap();

    assert_eq!(json["version"], json!(BASELINE_VERSION));
    assert_eq!(json["currentRevision"], json!(0));
    assert_eq!(json["_node"]["f"]["children"], json!(["b2", "b3"]));
    assert_eq!(json["_node"]["b2"]["pnid"], json!("f"));
}

#[test]
fn legacy_documents_are_a_bare_node_map() {
    let legacy = json!({
        "ROOT": {"ntype": "folder", "name": "Bookmarks", "children": ["a"]},
        "a": {"pnid": "ROOT", "name": "A", "url": "http://a"},
    });

    let loaded = Nodeset::from_json(&legacy.to_string()).unwrap();

    assert_eq!(loaded.version(), None);
    assert_eq!(loaded.revision(), 0);
    assert_eq!(loaded.get(&id("a")).unwrap().id, id("a"), "ids come from the map keys");
    assert_consistent(&loaded);
}

#[tokio::test]
async fn fetch_populates_from_the_store() {
    let mut adapter = MockAdapter {
        native: native_nodes(&sample_tree()),
        ..MockAdapter::default()
    };

    let fetched = Nodeset::fetch_from_native(&mut adapter, None).await.unwrap();

    assert_eq!(fetched.len(), 7);
    assert_eq!(
        fetched.preorder(&NodeId::root()),
        sample_tree().preorder(&NodeId::root())
    );
}

#[tokio::test]
async fn fetch_restores_what_the_store_cannot_hold() {
    let mut baseline = sample_tree();
    baseline
        .execute(&Command::Insert {
            id: id("sep"),
            parent_id: Some(id("f")),
            before_id: Some(id("b3")),
            kind: NodeKind::Separator,
            attrs: Attributes::new(),
        })
        .unwrap();

    let mut native = native_nodes(&sample_tree());
    let _prev = native[0].attrs.insert(NAME.to_owned(), json!("Other Bookmarks"));
    let mut adapter = MockAdapter {
        native,
        datasource: MockDatasource {
            unstorable: [id("sep")].into(),
            ..MockDatasource::default()
        },
        ..MockAdapter::default()
    };

    let fetched = Nodeset::fetch_from_native(&mut adapter, Some(&baseline))
        .await
        .unwrap();

    assert_eq!(children(&fetched, "f"), ids(&["b2", "sep", "b3"]));
    assert_eq!(fetched.root().unwrap().name(), Some("Bookmarks"), "root name comes from the baseline");
}

#[tokio::test]
async fn unnamed_baseline_root_clears_the_native_title() {
    let mut baseline = sample_tree();
    let _prev = baseline.node_mut(&NodeId::root()).unwrap().attrs.remove(NAME);

    let mut native = native_nodes(&sample_tree());
    let _prev = native[0].attrs.insert(NAME.to_owned(), json!("Other Bookmarks"));
    let mut adapter = MockAdapter {
        native,
        ..MockAdapter::default()
    };

    let fetched = Nodeset::fetch_from_native(&mut adapter, Some(&baseline))
        .await
        .unwrap();

    assert_eq!(fetched.root().unwrap().name(), None);
}

#[tokio::test]
async fn corrupt_store_reports_its_status() {
    let mut root = Node::folder("ROOT", "Bookmarks");
    root.children = Some(ids(&["ghost"]));
    let mut adapter = MockAdapter {
        native: vec![root],
        ..MockAdapter::default()
    };

    let err = Nodeset::fetch_from_native(&mut adapter, None).await.unwrap_err();

    assert_eq!(err.status(), 1006);
}

#[tokio::test]
async fn adapter_failures_are_terminal() {
    let mut adapter = MockAdapter {
        fail_with: Some(5),
        ..MockAdapter::default()
    };

    let err = Nodeset::fetch_from_native(&mut adapter, None).await.unwrap_err();
    assert_eq!(err.status(), 5, "the adapter's status is forwarded");

    let err = sample_tree().flush_to_native(&mut adapter).await.unwrap_err();
    assert_eq!(err.status(), 5);
}

#[tokio::test]
async fn flush_and_clear_reach_the_adapter() {
    let mut adapter = MockAdapter {
        native: native_nodes(&sample_tree()),
        ..MockAdapter::default()
    };

    sample_tree().flush_to_native(&mut adapter).await.unwrap();
    assert_eq!(adapter.accepted, Some(7));

    Nodeset::clear_native(&mut adapter).await.unwrap();
    assert!(adapter.cleared);
    assert!(adapter.native.is_empty());
}
