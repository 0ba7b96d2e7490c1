use marksync_primitives::command::Action;
use marksync_primitives::node::NAME;
use serde_json::json;

use super::*;
use crate::tests::common::*;

fn folder_snapshot(node_id: &str, name: &str, listed: &[&str]) -> Node {
    let mut node = Node::folder(node_id, name);
    node.children = Some(ids(listed));
    node
}

fn actions(commands: &Commandset) -> Vec<(Action, NodeId)> {
    commands
        .iter()
        .map(|command| (command.action(), command.id().clone()))
        .collect()
}

#[test]
fn unknown_child_is_inserted_then_relinked() {
    let mut nodeset = empty_tree();
    add(&mut nodeset, "ROOT", Node::folder("F", "F"));
    add(&mut nodeset, "F", Node::bookmark("X", "X", "http://x"));

    let updates = vec![
        folder_snapshot("F", "F", &["X", "Y"]),
        Node::bookmark("Y", "Y", "http://y"),
    ];

    let repair = nodeset
        .process_hash_updates(&updates, &MockDatasource::default())
        .unwrap();

    assert_eq!(
        actions(&repair.commands),
        vec![(Action::Insert, id("Y")), (Action::Move, id("Y"))]
    );
    assert_eq!(repair.commands.as_slice()[0].parent_id(), Some(&NodeId::root()));
    assert_eq!(children(&nodeset, "F"), ids(&["X", "Y"]));
    assert!(repair.reinsert.is_empty());
    assert_consistent(&nodeset);
}

#[test]
fn unlisted_children_are_deleted_and_captured() {
    let mut nodeset = sample_tree();

    let repair = nodeset
        .process_hash_updates(
            &[folder_snapshot("f", "Folder", &["b3"])],
            &MockDatasource::default(),
        )
        .unwrap();

    assert_eq!(actions(&repair.commands), vec![(Action::Delete, id("b2"))]);
    assert_eq!(actions(&repair.reinsert), vec![(Action::Insert, id("b2"))]);
    assert_eq!(repair.reinsert.as_slice()[0].parent_id(), Some(&id("f")));
    assert!(!nodeset.contains(&id("b2")));
}

#[test]
fn child_listed_elsewhere_is_moved_not_deleted() {
    let mut nodeset = sample_tree();

    let repair = nodeset
        .process_hash_updates(
            &[
                folder_snapshot("f", "Folder", &["b3"]),
                folder_snapshot("tb", "Toolbar", &["b2", "b1"]),
            ],
            &MockDatasource::default(),
        )
        .unwrap();

    assert_eq!(actions(&repair.commands), vec![(Action::Move, id("b2"))]);
    assert_eq!(children(&nodeset, "tb"), ids(&["b2", "b1"]));
    assert_eq!(children(&nodeset, "f"), ids(&["b3"]));
}

#[test]
fn mutable_attributes_are_updated() {
    let mut nodeset = sample_tree();
    let snapshot = Node::bookmark("b1", "Uno", "http://one").with_attr("description", "ignored");

    let repair = nodeset
        .process_hash_updates(&[snapshot], &MockDatasource::default())
        .unwrap();

    assert_eq!(actions(&repair.commands), vec![(Action::Update, id("b1"))]);
    let b1 = nodeset.get(&id("b1")).unwrap();
    assert_eq!(b1.attr(NAME), Some(&json!("Uno")));
    assert_eq!(b1.attr("description"), None, "only mutable attributes are repaired");
}

#[test]
fn deleted_folder_reinsert_skips_relinked_children() {
    let mut nodeset = sample_tree();
    let updates = vec![
        folder_snapshot("ROOT", "Bookmarks", &["tb", "b4"]),
        folder_snapshot("tb", "Toolbar", &["b1", "b3"]),
    ];

    let repair = nodeset
        .process_hash_updates(&updates, &MockDatasource::default())
        .unwrap();

    assert_eq!(
        actions(&repair.commands),
        vec![
            (Action::Reorder, id("tb")),
            (Action::Move, id("b3")),
            (Action::Delete, id("f")),
        ]
    );
    assert_eq!(
        actions(&repair.reinsert),
        vec![(Action::Insert, id("f")), (Action::Insert, id("b2"))],
        "b3 survives in the toolbar and is not re-created"
    );
    assert_eq!(children(&nodeset, "ROOT"), ids(&["tb", "b4"]));
    assert_eq!(children(&nodeset, "tb"), ids(&["b1", "b3"]));
    assert_consistent(&nodeset);
}

#[test]
fn repairing_twice_is_a_no_op() {
    let mut nodeset = sample_tree();
    let updates = vec![
        folder_snapshot("ROOT", "Bookmarks", &["b4", "f", "new"]),
        folder_snapshot("f", "Folder", &["b3", "b2", "b1"]),
        Node::bookmark("new", "New", "http://new"),
        Node::bookmark("b2", "Two", ""),
    ];

    let first = nodeset
        .process_hash_updates(&updates, &MockDatasource::default())
        .unwrap();
    assert!(!first.commands.is_empty());

    let second = nodeset
        .process_hash_updates(&updates, &MockDatasource::default())
        .unwrap();

    assert!(second.commands.is_empty(), "unexpected: {:?}", second.commands);
    assert!(second.reinsert.is_empty());
    assert_eq!(children(&nodeset, "ROOT"), ids(&["b4", "f", "new"]));
    assert_eq!(children(&nodeset, "f"), ids(&["b3", "b2", "b1"]));
    assert_eq!(nodeset.get(&id("b2")).unwrap().url(), None);
}

#[test]
fn dangling_snapshot_children_are_skipped() {
    let mut nodeset = sample_tree();

    let repair = nodeset
        .process_hash_updates(
            &[folder_snapshot("f", "Folder", &["b2", "ghost", "b3"])],
            &MockDatasource::default(),
        )
        .unwrap();

    assert!(repair.commands.is_empty());
    assert_eq!(children(&nodeset, "f"), ids(&["b2", "b3"]));
}

#[test]
fn node_with_its_own_snapshot_is_kept() {
    let mut nodeset = sample_tree();
    let updates = vec![
        folder_snapshot("f", "Folder", &["b3"]),
        Node::bookmark("b2", "Zwei", "http://two"),
    ];

    let repair = nodeset
        .process_hash_updates(&updates, &MockDatasource::default())
        .unwrap();

    assert_eq!(actions(&repair.commands), vec![(Action::Update, id("b2"))]);
    assert!(repair.reinsert.is_empty(), "unexpected: {:?}", repair.reinsert);
    assert_eq!(nodeset.get(&id("b2")).unwrap().name(), Some("Zwei"));
    assert_eq!(children(&nodeset, "f"), ids(&["b2", "b3"]));
    assert_consistent(&nodeset);
}

#[test]
fn nested_deletes_collapse_into_the_outermost() {
    let mut nodeset = sample_tree();
    add(&mut nodeset, "f", Node::folder("g", "Inner"));
    add(&mut nodeset, "g", Node::bookmark("h", "Deep", "http://deep"));
    let updates = vec![
        folder_snapshot("g", "Inner", &[]),
        folder_snapshot("ROOT", "Bookmarks", &["tb", "b4"]),
    ];

    let repair = nodeset
        .process_hash_updates(&updates, &MockDatasource::default())
        .unwrap();

    assert_eq!(
        actions(&repair.commands),
        vec![(Action::Reorder, id("tb")), (Action::Delete, id("f"))],
        "h goes with f"
    );
    assert_eq!(
        actions(&repair.reinsert),
        vec![
            (Action::Insert, id("f")),
            (Action::Insert, id("b2")),
            (Action::Insert, id("b3")),
            (Action::Insert, id("g")),
            (Action::Insert, id("h")),
        ]
    );
    assert!(!nodeset.contains(&id("h")));

    for command in repair.reinsert.iter() {
        nodeset.execute(command).unwrap();
    }

    assert_eq!(children(&nodeset, "ROOT"), ids(&["tb", "b4", "f"]));
    assert_eq!(children(&nodeset, "f"), ids(&["b2", "b3", "g"]));
    assert_eq!(children(&nodeset, "g"), ids(&["h"]));
    assert_consistent(&nodeset);
}
