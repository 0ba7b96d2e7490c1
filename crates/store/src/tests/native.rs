use camino::Utf8PathBuf;
use tempdir::TempDir;

use super::*;

#[test]
fn new_database_holds_the_fixed_folders() {
    let tree = NativeTree::new();

    assert_eq!(tree.len(), 3);
    assert_eq!(
        tree.get(NATIVE_ROOT).unwrap().children,
        [NATIVE_TOOLBAR, NATIVE_OTHER]
    );
    assert_eq!(tree.get(NATIVE_OTHER).unwrap().parent.as_deref(), Some(NATIVE_ROOT));
    assert!(NativeTree::is_fixed(NATIVE_TOOLBAR));
    assert!(!NativeTree::is_fixed("3"));
}

#[test]
fn create_appends_and_allocates_fresh_ids() {
    let mut tree = NativeTree::new();

    let first = tree
        .create(NATIVE_OTHER, NativeKind::Bookmark, "One", Some("http://one/"))
        .unwrap();
    let second = tree
        .create(NATIVE_OTHER, NativeKind::Folder, "Folder", None)
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(tree.get(NATIVE_OTHER).unwrap().children, [first.clone(), second]);
    assert_eq!(tree.get(&first).unwrap().url.as_deref(), Some("http://one/"));
}

#[test]
fn create_under_unknown_parent_fails() {
    let mut tree = NativeTree::new();

    let err = tree
        .create("42", NativeKind::Folder, "Lost", None)
        .unwrap_err();

    assert!(matches!(err, StoreError::UnknownEntry(ref id) if id == "42"), "got {err}");
    assert_eq!(tree.len(), 3, "nothing is created");
}

#[test]
fn remove_takes_the_whole_subtree() {
    let mut tree = NativeTree::new();
    let folder = tree
        .create(NATIVE_TOOLBAR, NativeKind::Folder, "Folder", None)
        .unwrap();
    let inner = tree
        .create(&folder, NativeKind::Bookmark, "Inner", Some("http://inner/"))
        .unwrap();
    let kept = tree
        .create(NATIVE_TOOLBAR, NativeKind::Bookmark, "Kept", Some("http://kept/"))
        .unwrap();

    let mut removed = tree.remove(&folder).unwrap();
    removed.sort();

    let mut expected = vec![folder, inner];
    expected.sort();
    assert_eq!(removed, expected);
    assert_eq!(tree.get(NATIVE_TOOLBAR).unwrap().children, [kept]);
    assert!(tree.remove("99").is_err());
}

#[test]
fn descendants_are_listed_parents_first() {
    let mut tree = NativeTree::new();
    let a = tree.create(NATIVE_OTHER, NativeKind::Folder, "A", None).unwrap();
    let a1 = tree.create(&a, NativeKind::Bookmark, "A1", Some("http://a1/")).unwrap();
    let b = tree.create(NATIVE_OTHER, NativeKind::Bookmark, "B", Some("http://b/")).unwrap();

    assert_eq!(tree.descendants(NATIVE_OTHER), [a, a1, b]);
    assert!(tree.descendants(NATIVE_TOOLBAR).is_empty());
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = TempDir::new("marksync-native").unwrap();
    let path = Utf8PathBuf::try_from(dir.path().join("places.json")).unwrap();

    let mut tree = NativeTree::new();
    let id = tree
        .create(NATIVE_OTHER, NativeKind::Bookmark, "One", Some("http://one/"))
        .unwrap();
    tree.save(&path).await.unwrap();

    let mut loaded = NativeTree::load(&path).await.unwrap();

    assert_eq!(loaded.get(&id), tree.get(&id));
    assert_ne!(loaded.allocate_id(), id, "the id counter is persisted");
}
