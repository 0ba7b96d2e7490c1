//! Store adapter over the JSON-backed native database.

#[cfg(test)]
#[path = "tests/memory.rs"]
mod tests;

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use camino::Utf8Path;
use marksync_nodeset::{AttributePolicy, Datasource, Nodeset, StoreAdapter, StoreError};
use marksync_primitives::id::NodeId;
use marksync_primitives::node::{Node, NodeKind, NAME, TOOLBAR_ID, URL};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::idmap::IdMap;
use crate::native::{now_millis, NativeEntry, NativeKind, NativeTree, NATIVE_OTHER, NATIVE_ROOT, NATIVE_TOOLBAR};

/// Status reported when asked to remove one of the fixed native folders.
pub const STATUS_FIXED_ENTRY: i32 = 1010;

/// Attribute carrying the native creation time.
pub const CREATED: &str = "created";

/// The reference native store: a [`NativeTree`] plus the [`IdMap`] that ties
/// its entries to node ids.
///
/// The "other bookmarks" folder is exposed as the tree root; the toolbar is
/// sewn in as the root's first child and published through its `tnid`.
/// Only folders and bookmarks with a parseable url can be stored.
#[derive(Debug)]
pub struct MemoryStore {
    tree: NativeTree,
    ids: IdMap,
    policy: AttributePolicy,
    order_is_important: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new(tree: NativeTree, ids: IdMap, policy: AttributePolicy) -> Self {
        Self {
            tree,
            ids,
            policy,
            order_is_important: true,
        }
    }

    #[must_use]
    pub const fn with_order_is_important(mut self, order_is_important: bool) -> Self {
        self.order_is_important = order_is_important;
        self
    }

    /// Opens the database and id map at the given paths; either starts
    /// empty when its file does not exist yet.
    pub async fn open(
        store_path: &Utf8Path,
        ids_path: &Utf8Path,
        policy: AttributePolicy,
    ) -> Result<Self, StoreError> {
        let tree = if fs::try_exists(store_path).await? {
            NativeTree::load(store_path).await?
        } else {
            debug!(%store_path, "no native store yet; starting empty");
            NativeTree::new()
        };
        let ids = IdMap::load(ids_path).await?;

        Ok(Self::new(tree, ids, policy))
    }

    /// Writes the database and the id map back.
    pub async fn persist(&mut self, store_path: &Utf8Path, ids_path: &Utf8Path) -> Result<(), StoreError> {
        self.tree.save(store_path).await?;
        self.ids.persist(ids_path).await
    }

    #[must_use]
    pub const fn tree(&self) -> &NativeTree {
        &self.tree
    }

    #[must_use]
    pub const fn ids(&self) -> &IdMap {
        &self.ids
    }

    fn node_id_of(&mut self, native: &str) -> NodeId {
        if native == NATIVE_OTHER {
            return NodeId::root();
        }
        self.ids.map_native(native)
    }

    /// Translates the native tree into nodes, root first.
    fn collect_nodes(&mut self) -> Vec<Node> {
        let root = NodeId::root();
        self.ids.insert(NATIVE_OTHER, root.clone());
        let toolbar = self.node_id_of(NATIVE_TOOLBAR);

        let mut nodes = Vec::with_capacity(self.tree.len());

        let other = self.tree.get(NATIVE_OTHER).cloned();
        let mut root_node = Node::new(root.clone(), NodeKind::Folder)
            .with_attr(TOOLBAR_ID, Value::String(toolbar.to_string()));
        if let Some(other) = &other {
            if !other.title.is_empty() {
                root_node = root_node.with_attr(NAME, other.title.as_str());
            }
        }
        let mut root_children = vec![toolbar.clone()];
        for child in other.iter().flat_map(|other| &other.children) {
            root_children.push(self.node_id_of(child));
        }
        root_node.children = Some(root_children);
        nodes.push(root_node);

        for start in [NATIVE_TOOLBAR, NATIVE_OTHER] {
            let mut ids = Vec::new();
            if start == NATIVE_TOOLBAR {
                ids.push(start.to_owned());
            }
            ids.extend(self.tree.descendants(start));

            for native in ids {
                let Some(entry) = self.tree.get(&native).cloned() else {
                    continue;
                };
                let node = self.entry_to_node(&entry);
                nodes.push(node);
            }
        }

        nodes
    }

    fn entry_to_node(&mut self, entry: &NativeEntry) -> Node {
        let kind = match entry.kind {
            NativeKind::Folder => NodeKind::Folder,
            NativeKind::Bookmark => NodeKind::Bookmark,
        };

        let mut node = Node::new(self.node_id_of(&entry.id), kind);
        node.parent_id = match entry.parent.as_deref() {
            Some(NATIVE_ROOT) | None => Some(NodeId::root()),
            Some(parent) => Some(self.node_id_of(parent)),
        };
        if !entry.title.is_empty() {
            node = node.with_attr(NAME, entry.title.as_str());
        }
        if let Some(url) = &entry.url {
            node = node.with_attr(URL, url.as_str());
        }
        node = node.with_attr(CREATED, entry.date_added);

        if node.is_folder() {
            let children = entry
                .children
                .iter()
                .map(|child| self.node_id_of(child))
                .collect();
            node.children = Some(children);
        }

        node
    }
}

impl Datasource for MemoryStore {
    fn policy(&self) -> &AttributePolicy {
        &self.policy
    }

    fn order_is_important(&self) -> bool {
        self.order_is_important
    }

    fn normalize_url<'a>(&self, url: &'a str) -> Cow<'a, str> {
        match Url::parse(url) {
            Ok(parsed) if parsed.as_str() != url => Cow::Owned(parsed.into()),
            _ => Cow::Borrowed(url),
        }
    }

    fn can_store(&self, node: &Node) -> bool {
        match node.kind {
            NodeKind::Folder => true,
            NodeKind::Bookmark => node.url().is_some_and(|url| Url::parse(url).is_ok()),
            _ => false,
        }
    }

    fn remove_native(&mut self, id: &NodeId) -> Result<(), StoreError> {
        let native = self
            .ids
            .native_id(id)
            .ok_or_else(|| StoreError::Unmapped(id.clone()))?
            .to_owned();

        if NativeTree::is_fixed(&native) {
            return Err(StoreError::Status(STATUS_FIXED_ENTRY));
        }

        for removed in self.tree.remove(&native)? {
            let _node = self.ids.remove_native(&removed);
        }

        debug!(%id, native, "removed native entry");

        Ok(())
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn provide_nodes(&mut self, sink: &mut (dyn FnMut(Node) + Send)) -> Result<(), StoreError> {
        let nodes = self.collect_nodes();
        debug!(count = nodes.len(), "providing native nodes");

        for node in nodes {
            sink(node);
        }

        Ok(())
    }

    async fn accept_nodes(&mut self, nodeset: &Nodeset) -> Result<(), StoreError> {
        let root = NodeId::root();
        let toolbar = nodeset.toolbar_id();

        let mut entries = BTreeMap::new();
        for fixed in [NATIVE_ROOT, NATIVE_TOOLBAR, NATIVE_OTHER] {
            let mut entry = self
                .tree
                .get(fixed)
                .cloned()
                .unwrap_or_else(|| NativeEntry::folder(fixed, (fixed != NATIVE_ROOT).then_some(NATIVE_ROOT), ""));
            if fixed != NATIVE_ROOT {
                entry.children.clear();
            }
            let _prev = entries.insert(fixed.to_owned(), entry);
        }

        if let Some(name) = nodeset.node(&root).and_then(Node::name) {
            if let Some(other) = entries.get_mut(NATIVE_OTHER) {
                name.clone_into(&mut other.title);
            }
        }
        self.ids.insert(NATIVE_OTHER, root.clone());

        let mut stack: Vec<(NodeId, String)> = Vec::new();
        if let Some(toolbar) = &toolbar {
            if let Some(name) = nodeset.node(toolbar).and_then(Node::name) {
                if let Some(entry) = entries.get_mut(NATIVE_TOOLBAR) {
                    name.clone_into(&mut entry.title);
                }
            }
            self.ids.insert(NATIVE_TOOLBAR, toolbar.clone());
            push_children(nodeset, toolbar, NATIVE_TOOLBAR, &mut stack);
        }
        push_children(nodeset, &root, NATIVE_OTHER, &mut stack);

        let mut used: HashSet<String> = HashSet::new();
        let mut skipped = 0_usize;

        while let Some((id, native_parent)) = stack.pop() {
            if Some(&id) == toolbar.as_ref() {
                continue;
            }
            let Some(node) = nodeset.node(&id) else {
                warn!(%id, "flushed tree references a missing node");
                continue;
            };
            if !self.can_store(node) {
                skipped = skipped.saturating_add(1);
                continue;
            }

            let reused = self
                .ids
                .native_id(&id)
                .filter(|native| {
                    !NativeTree::is_fixed(native) && self.tree.contains(native) && !used.contains(*native)
                })
                .map(ToOwned::to_owned);
            let native = match reused {
                Some(native) => native,
                None => self.tree.allocate_id(),
            };
            let _new = used.insert(native.clone());

            let entry = NativeEntry {
                id: native.clone(),
                parent: Some(native_parent.clone()),
                kind: if node.is_folder() {
                    NativeKind::Folder
                } else {
                    NativeKind::Bookmark
                },
                title: node.name().unwrap_or_default().to_owned(),
                url: node.url().map(ToOwned::to_owned),
                date_added: self
                    .tree
                    .get(&native)
                    .map_or_else(now_millis, |existing| existing.date_added),
                children: Vec::new(),
            };

            if let Some(parent) = entries.get_mut(&native_parent) {
                parent.children.push(native.clone());
            }
            let _prev = entries.insert(native.clone(), entry);
            self.ids.insert(&native, id.clone());

            if node.is_folder() {
                push_children(nodeset, &id, &native, &mut stack);
            }
        }

        self.tree.replace_entries(entries);
        let tree = &self.tree;
        self.ids.retain(|native| tree.contains(native));

        info!(entries = self.tree.len(), skipped, "native store updated");

        Ok(())
    }

    async fn clear_local_store(&mut self) -> Result<(), StoreError> {
        for fixed in [NATIVE_TOOLBAR, NATIVE_OTHER] {
            let children = self
                .tree
                .get(fixed)
                .map(|entry| entry.children.clone())
                .unwrap_or_default();
            for child in children {
                let _removed = self.tree.remove(&child)?;
            }
        }

        self.ids.retain(NativeTree::is_fixed);

        info!("native store cleared");

        Ok(())
    }
}

/// Schedules the children of `id` so they pop off `stack` in order.
fn push_children(nodeset: &Nodeset, id: &NodeId, native_parent: &str, stack: &mut Vec<(NodeId, String)>) {
    if let Some(node) = nodeset.node(id) {
        stack.extend(
            node.children()
                .iter()
                .rev()
                .map(|child| (child.clone(), native_parent.to_owned())),
        );
    }
}
