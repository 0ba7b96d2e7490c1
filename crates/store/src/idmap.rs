//! Native id to node id mapping.

#[cfg(test)]
#[path = "tests/idmap.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap};

use camino::Utf8Path;
use marksync_nodeset::StoreError;
use marksync_primitives::id::NodeId;
use tokio::fs;
use tracing::{debug, trace};

/// Two-way mapping between the ids of the native store and the stable node
/// ids of the tree, persisted as `{native_id: nid}`.
///
/// The map is owned by the adapter and passed around explicitly; it is only
/// written to disk by [`IdMap::persist`].
#[derive(Clone, Debug, Default)]
pub struct IdMap {
    by_native: BTreeMap<String, NodeId>,
    by_node: HashMap<NodeId, String>,
    dirty: bool,
}

impl IdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the map at `path`, or starts empty when there is none.
    pub async fn load(path: &Utf8Path) -> Result<Self, StoreError> {
        if !fs::try_exists(path).await? {
            debug!(%path, "no id map yet; starting empty");
            return Ok(Self::new());
        }

        let json = fs::read_to_string(path).await?;
        let by_native: BTreeMap<String, NodeId> = serde_json::from_str(&json)?;
        let by_node = by_native
            .iter()
            .map(|(native, node)| (node.clone(), native.clone()))
            .collect();

        debug!(%path, entries = by_native.len(), "loaded id map");

        Ok(Self {
            by_native,
            by_node,
            dirty: false,
        })
    }

    /// Writes the map to `path` if it changed since it was loaded.
    pub async fn persist(&mut self, path: &Utf8Path) -> Result<(), StoreError> {
        if !self.dirty && fs::try_exists(path).await? {
            return Ok(());
        }

        fs::write(path, serde_json::to_string_pretty(&self.by_native)?).await?;
        self.dirty = false;

        debug!(%path, entries = self.by_native.len(), "persisted id map");

        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_native.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_native.is_empty()
    }

    /// Whether unpersisted changes exist.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The node id of a native entry, if mapped.
    #[must_use]
    pub fn node_id(&self, native: &str) -> Option<&NodeId> {
        self.by_native.get(native)
    }

    /// The native id behind a node, if mapped.
    #[must_use]
    pub fn native_id(&self, node: &NodeId) -> Option<&str> {
        self.by_node.get(node).map(String::as_str)
    }

    /// The node id of a native entry, minting a fresh one the first time the
    /// entry is seen.
    pub fn map_native(&mut self, native: &str) -> NodeId {
        if let Some(node) = self.by_native.get(native) {
            return node.clone();
        }

        let mut node = NodeId::generate();
        while self.by_node.contains_key(&node) {
            node = NodeId::generate();
        }

        self.insert(native, node.clone());
        node
    }

    /// Records that `native` stands for `node`, replacing earlier mappings
    /// of either.
    pub fn insert(&mut self, native: &str, node: NodeId) {
        if let Some(old_native) = self.by_node.remove(&node) {
            let _prev = self.by_native.remove(&old_native);
        }
        if let Some(old_node) = self.by_native.remove(native) {
            let _prev = self.by_node.remove(&old_node);
        }

        trace!(native, %node, "mapping native entry");

        let _prev = self.by_native.insert(native.to_owned(), node.clone());
        let _prev = self.by_node.insert(node, native.to_owned());
        self.dirty = true;
    }

    /// Forgets the mapping of a native entry.
    pub fn remove_native(&mut self, native: &str) -> Option<NodeId> {
        let node = self.by_native.remove(native)?;
        let _prev = self.by_node.remove(&node);
        self.dirty = true;
        Some(node)
    }

    /// Keeps only the mappings whose native id passes `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let before = self.by_native.len();
        self.by_native.retain(|native, _| keep(native));
        self.by_node.retain(|_, native| self.by_native.contains_key(native));

        if self.by_native.len() != before {
            self.dirty = true;
        }
    }
}
