use std::sync::Arc;

use marksync_primitives::command::Command;
use marksync_primitives::node::{Attributes, NAME};
use serde_json::Value;

use super::*;
use crate::tests::common::*;

fn rename(nodeset: &mut Nodeset, target: &str, name: &str) {
    nodeset
        .execute(&Command::Update {
            id: id(target),
            attrs: Attributes::from([(NAME.to_owned(), Value::from(name))]),
        })
        .unwrap();
}

#[test]
fn clone_reads_through_to_its_source() {
    let source = Arc::new(sample_tree());
    let clone = Nodeset::clone_of(Arc::clone(&source));

    assert!(clone.is_clone());
    assert_eq!(clone.len(), source.len(), "a clone starts with its source's size");
    assert_eq!(clone.get(&id("b2")).unwrap().name(), Some("Two"));
    assert_eq!(clone.preorder(&NodeId::root()), source.preorder(&NodeId::root()));
}

#[test]
fn writes_to_a_clone_never_reach_the_source() {
    let source = Arc::new(sample_tree());
    let mut clone = Nodeset::clone_of(Arc::clone(&source));

    rename(&mut clone, "b2", "Deux");
    clone.execute(&Command::Delete { id: id("b3") }).unwrap();

    assert_eq!(clone.get(&id("b2")).unwrap().name(), Some("Deux"));
    assert_eq!(source.get(&id("b2")).unwrap().name(), Some("Two"), "source keeps its name");

    assert!(!clone.contains(&id("b3")), "deleted node is hidden in the clone");
    assert!(source.contains(&id("b3")), "source still holds the deleted node");
    assert_eq!(children(&source, "f"), ids(&["b2", "b3"]));
    assert_eq!(children(&clone, "f"), ids(&["b2"]));
    assert_eq!(clone.len(), source.len() - 1);
}

#[test]
fn node_mut_on_a_deleted_node_fails() {
    let mut clone = Nodeset::clone_of(Arc::new(sample_tree()));
    clone.execute(&Command::Delete { id: id("f") }).unwrap();

    assert!(
        matches!(clone.node_mut(&id("b2")), Err(NodesetError::NotFound(_))),
        "descendants of a deleted folder are gone too"
    );
}

#[tokio::test]
async fn declone_materializes_reachable_nodes() {
    let source = Arc::new(sample_tree());
    let mut clone = Nodeset::clone_of(Arc::clone(&source));
    rename(&mut clone, "b1", "Uno");
    clone.execute(&Command::Delete { id: id("b4") }).unwrap();

    clone.declone().await.unwrap();
    drop(source);

    assert!(!clone.is_clone(), "declone severs the source");
    assert_eq!(clone.len(), 6);
    assert_eq!(clone.get(&id("b1")).unwrap().name(), Some("Uno"));
    assert!(!clone.contains(&id("b4")));
    assert_consistent(&clone);
}

#[test]
fn populate_drops_children_claimed_twice() {
    let mut nodeset = Nodeset::new();
    nodeset.begin_populate();

    let mut root = Node::folder("ROOT", "Bookmarks");
    root.children = Some(ids(&["a", "x"]));
    let mut folder = Node::folder("x", "X");
    folder.parent_id = Some(NodeId::root());
    folder.children = Some(ids(&["a"]));
    let mut leaf = Node::bookmark("a", "A", "http://a");
    leaf.parent_id = Some(NodeId::root());

    nodeset.add_node(root);
    nodeset.add_node(folder);
    nodeset.add_node(leaf);
    nodeset.end_populate();

    assert_eq!(children(&nodeset, "ROOT"), ids(&["a", "x"]));
    assert!(children(&nodeset, "x").is_empty(), "second claim on a is filtered");
    assert_consistent(&nodeset);
}

#[test]
fn populate_keeps_the_first_of_two_equal_ids() {
    let mut nodeset = empty_tree();

    let mut first = Node::bookmark("a", "First", "http://a");
    first.parent_id = Some(NodeId::root());
    let mut second = Node::bookmark("a", "Second", "http://a");
    second.parent_id = Some(NodeId::root());

    nodeset.add_node(first);
    nodeset.add_node(second);

    assert_eq!(nodeset.len(), 2);
    assert_eq!(nodeset.get(&id("a")).unwrap().name(), Some("First"));
}

#[test]
fn validate_reports_a_child_naming_another_parent() {
    let mut nodeset = Nodeset::new();

    let mut root = Node::folder("ROOT", "Bookmarks");
    root.children = Some(ids(&["a"]));
    let mut leaf = Node::bookmark("a", "A", "http://a");
    leaf.parent_id = Some(id("elsewhere"));

    nodeset.add_node(root);
    nodeset.add_node(leaf);

    let err = nodeset.validate().unwrap_err();
    assert_eq!(err.status(), 1006, "corruption surfaces as its own status");
}

#[test]
fn validate_reports_dangling_children() {
    let mut nodeset = Nodeset::new();
    let mut root = Node::folder("ROOT", "Bookmarks");
    root.children = Some(ids(&["ghost"]));
    nodeset.add_node(root);

    assert!(matches!(nodeset.validate(), Err(NodesetError::Corrupt(_))));
}

#[test]
fn tree_queries() {
    let nodeset = sample_tree();

    assert_eq!(nodeset.toolbar_id(), Some(id("tb")));
    assert_eq!(nodeset.unfiled_id(), None, "no unid on the root");
    assert!(nodeset.has_ancestor(&id("b2"), &NodeId::root()).unwrap());
    assert!(!nodeset.has_ancestor(&id("b2"), &id("tb")).unwrap());
    assert_eq!(nodeset.next_sibling(&id("b2")), Some(id("b3")));
    assert_eq!(nodeset.next_sibling(&id("b3")), None);
    assert_eq!(
        nodeset.preorder(&NodeId::root()),
        ids(&["ROOT", "tb", "b1", "f", "b2", "b3", "b4"]),
        "preorder visits parents first and keeps child order"
    );
    assert_eq!(nodeset.describe(&id("f")), "Folder(f)");
}

#[test]
fn dangling_toolbar_pointer_does_not_resolve() {
    let mut nodeset = sample_tree();
    nodeset.execute(&Command::Delete { id: id("tb") }).unwrap();

    assert_eq!(nodeset.toolbar_id(), None);
}

#[test]
fn fresh_ids_are_unused() {
    let nodeset = sample_tree();
    let fresh = nodeset.fresh_id();

    assert!(!nodeset.contains(&fresh));
    assert_eq!(fresh.as_str().len(), 30);
}
