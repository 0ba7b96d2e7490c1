use camino::Utf8PathBuf;
use marksync_primitives::command::Command;
use marksync_primitives::node::Attributes;
use tempdir::TempDir;

use super::*;

/// ```text
/// 0
/// ├── 1 "Bookmarks Toolbar"
/// │   └── one http://one/
/// └── 2 "Other Bookmarks"
///     ├── folder "Folder"
///     │   └── two http://two/
///     └── three http://three/
/// ```
fn sample_store() -> (MemoryStore, [String; 4]) {
    let mut tree = NativeTree::new();
    let one = tree
        .create(NATIVE_TOOLBAR, NativeKind::Bookmark, "One", Some("http://one/"))
        .unwrap();
    let folder = tree
        .create(NATIVE_OTHER, NativeKind::Folder, "Folder", None)
        .unwrap();
    let two = tree
        .create(&folder, NativeKind::Bookmark, "Two", Some("http://two/"))
        .unwrap();
    let three = tree
        .create(NATIVE_OTHER, NativeKind::Bookmark, "Three", Some("http://three/"))
        .unwrap();

    let store = MemoryStore::new(tree, IdMap::new(), AttributePolicy::default());
    (store, [one, folder, two, three])
}

fn node_of(store: &MemoryStore, native: &str) -> NodeId {
    store.ids().node_id(native).expect("mapped").clone()
}

#[tokio::test]
async fn other_bookmarks_become_the_root() {
    let (mut store, [one, folder, two, three]) = sample_store();

    let nodeset = Nodeset::fetch_from_native(&mut store, None).await.unwrap();

    let toolbar = node_of(&store, NATIVE_TOOLBAR);
    let root = nodeset.root().unwrap();
    assert_eq!(root.name(), Some("Other Bookmarks"));
    assert_eq!(nodeset.toolbar_id(), Some(toolbar.clone()));
    assert_eq!(
        root.children(),
        [toolbar.clone(), node_of(&store, &folder), node_of(&store, &three)],
        "the toolbar is sewn in first"
    );
    assert_eq!(
        nodeset.get(&toolbar).unwrap().children(),
        [node_of(&store, &one)]
    );

    let two = nodeset.get(&node_of(&store, &two)).unwrap();
    assert_eq!(two.url(), Some("http://two/"));
    assert_eq!(two.parent_id, Some(node_of(&store, &folder)));
    assert!(two.attr(CREATED).is_some());
    assert_eq!(nodeset.len(), 6);
}

#[tokio::test]
async fn node_ids_survive_a_refetch() {
    let (mut store, [_, folder, ..]) = sample_store();

    let first = Nodeset::fetch_from_native(&mut store, None).await.unwrap();
    let second = Nodeset::fetch_from_native(&mut store, None).await.unwrap();

    assert_eq!(first.preorder(&NodeId::root()), second.preorder(&NodeId::root()));
    assert_eq!(store.ids().native_id(&node_of(&store, &folder)), Some(folder.as_str()));
}

#[tokio::test]
async fn flush_rebuilds_the_native_tree() {
    let (mut store, [one, folder, two, three]) = sample_store();
    let mut nodeset = Nodeset::fetch_from_native(&mut store, None).await.unwrap();

    let folder_id = node_of(&store, &folder);
    let three_id = node_of(&store, &three);
    nodeset
        .execute(&Command::Move {
            id: three_id.clone(),
            parent_id: folder_id.clone(),
            before_id: None,
        })
        .unwrap();
    nodeset
        .execute(&Command::Insert {
            id: NodeId::new("fresh"),
            parent_id: Some(folder_id.clone()),
            before_id: Some(three_id.clone()),
            kind: NodeKind::Bookmark,
            attrs: Node::bookmark("fresh", "Fresh", "http://fresh/").attrs,
        })
        .unwrap();

    nodeset.flush_to_native(&mut store).await.unwrap();

    let tree = store.tree();
    let fresh = store.ids().native_id(&NodeId::new("fresh")).unwrap().to_owned();
    assert_eq!(tree.get(NATIVE_OTHER).unwrap().children, [folder.clone()]);
    assert_eq!(tree.get(&folder).unwrap().children, [two, fresh.clone(), three.clone()]);
    assert_eq!(tree.get(&three).unwrap().parent.as_deref(), Some(folder.as_str()));
    assert_eq!(tree.get(NATIVE_TOOLBAR).unwrap().children, [one], "native ids are reused");
    assert_eq!(tree.get(&fresh).unwrap().title, "Fresh");

    let refetched = Nodeset::fetch_from_native(&mut store, None).await.unwrap();
    assert_eq!(
        refetched.preorder(&NodeId::root()),
        nodeset.preorder(&NodeId::root())
    );
}

#[tokio::test]
async fn unrepresentable_nodes_are_left_out_and_restored() {
    let (mut store, [_, folder, two, _]) = sample_store();
    let mut baseline = Nodeset::fetch_from_native(&mut store, None).await.unwrap();

    let folder_id = node_of(&store, &folder);
    let two_id = node_of(&store, &two);
    baseline
        .execute(&Command::Insert {
            id: NodeId::new("sep"),
            parent_id: Some(folder_id.clone()),
            before_id: Some(two_id.clone()),
            kind: NodeKind::Separator,
            attrs: Attributes::new(),
        })
        .unwrap();
    assert!(!store.can_store(baseline.get(&NodeId::new("sep")).unwrap()));

    baseline.flush_to_native(&mut store).await.unwrap();
    assert_eq!(store.tree().get(&folder).unwrap().children, [two]);
    assert_eq!(store.ids().native_id(&NodeId::new("sep")), None);

    let fetched = Nodeset::fetch_from_native(&mut store, Some(&baseline)).await.unwrap();

    assert_eq!(
        fetched.get(&folder_id).unwrap().children(),
        [NodeId::new("sep"), two_id]
    );
}

#[test]
fn only_folders_and_valid_bookmarks_are_storable() {
    let (store, _) = sample_store();

    assert!(store.can_store(&Node::folder("f", "Folder")));
    assert!(store.can_store(&Node::bookmark("b", "B", "https://example.com/x")));
    assert!(!store.can_store(&Node::bookmark("b", "B", "not a url")));
    assert!(!store.can_store(&Node::new(NodeId::new("s"), NodeKind::Separator)));
}

#[test]
fn urls_are_normalized_by_parsing() {
    let (store, _) = sample_store();

    assert_eq!(store.normalize_url("HTTP://Example.COM"), "http://example.com/");
    assert!(matches!(
        store.normalize_url("http://example.com/"),
        Cow::Borrowed(_)
    ));
    assert_eq!(store.normalize_url("not a url"), "not a url");
}

#[tokio::test]
async fn remove_native_drops_the_subtree_and_its_mappings() {
    let (mut store, [_, folder, two, _]) = sample_store();
    let _nodeset = Nodeset::fetch_from_native(&mut store, None).await.unwrap();
    let folder_id = node_of(&store, &folder);
    let two_id = node_of(&store, &two);

    store.remove_native(&folder_id).unwrap();

    assert!(!store.tree().contains(&folder));
    assert!(!store.tree().contains(&two));
    assert_eq!(store.ids().native_id(&two_id), None);

    let err = store.remove_native(&folder_id).unwrap_err();
    assert!(matches!(err, StoreError::Unmapped(_)), "got {err}");

    let err = store.remove_native(&NodeId::root()).unwrap_err();
    assert_eq!(err.status(), STATUS_FIXED_ENTRY, "fixed folders cannot be removed");
}

#[tokio::test]
async fn clear_keeps_only_the_fixed_folders() {
    let (mut store, _) = sample_store();
    let _nodeset = Nodeset::fetch_from_native(&mut store, None).await.unwrap();

    Nodeset::clear_native(&mut store).await.unwrap();

    assert_eq!(store.tree().len(), 3);
    assert!(store.tree().get(NATIVE_OTHER).unwrap().children.is_empty());
    assert!(store.ids().node_id(NATIVE_OTHER).is_some());
    assert_eq!(store.ids().len(), 2, "only the toolbar and root stay mapped");
}

#[tokio::test]
async fn open_and_persist_round_trip() {
    let dir = TempDir::new("marksync-store").unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let store_path = root.join("places.json");
    let ids_path = root.join("ids.json");

    let mut store = MemoryStore::open(&store_path, &ids_path, AttributePolicy::default())
        .await
        .unwrap();
    assert_eq!(store.tree().len(), 3, "a missing database starts with the fixed folders");

    let id = store
        .tree
        .create(NATIVE_OTHER, NativeKind::Bookmark, "One", Some("http://one/"))
        .unwrap();
    let nodeset = Nodeset::fetch_from_native(&mut store, None).await.unwrap();
    store.persist(&store_path, &ids_path).await.unwrap();

    let mut reopened = MemoryStore::open(&store_path, &ids_path, AttributePolicy::default())
        .await
        .unwrap();
    let refetched = Nodeset::fetch_from_native(&mut reopened, None).await.unwrap();

    assert!(reopened.tree().contains(&id));
    assert_eq!(
        refetched.preorder(&NodeId::root()),
        nodeset.preorder(&NodeId::root()),
        "node ids come back from the persisted map"
    );
}
