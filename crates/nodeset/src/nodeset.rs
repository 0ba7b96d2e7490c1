//! Node arena with copy-on-write cloning.

#[cfg(test)]
#[path = "tests/nodeset.rs"]
mod tests;

use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use marksync_primitives::id::NodeId;
use marksync_primitives::node::Node;
use tracing::{debug, warn};

use crate::error::NodesetError;
use crate::walk::Order;

/// Default length of one traversal time slice.
pub const DEFAULT_WALK_SLICE: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
enum Slot {
    Owned(Node),
    /// Known deleted; hides any inherited node of the same id.
    Tombstone,
}

/// One snapshot of a bookmark tree.
///
/// Nodes are addressed by id. A nodeset cloned from a baseline reads through
/// to it for every id it does not hold itself, and copies a node into its own
/// store before the first write to it.
#[derive(Clone, Debug)]
pub struct Nodeset {
    nodes: HashMap<NodeId, Slot>,
    clone_source: Option<Arc<Nodeset>>,
    len: usize,
    revision: u64,
    version: Option<String>,
    slice: Duration,
    /// Child id to claiming parent, tracked only while populating.
    claimed: Option<HashMap<NodeId, NodeId>>,
}

impl Default for Nodeset {
    fn default() -> Self {
        Self::new()
    }
}

impl Nodeset {
    /// An empty nodeset.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            clone_source: None,
            len: 0,
            revision: 0,
            version: None,
            slice: DEFAULT_WALK_SLICE,
            claimed: None,
        }
    }

    /// A nodeset that reads through to `source` until written.
    #[must_use]
    pub fn clone_of(source: Arc<Self>) -> Self {
        Self {
            nodes: HashMap::new(),
            len: source.len,
            revision: source.revision,
            version: source.version.clone(),
            slice: source.slice,
            claimed: None,
            clone_source: Some(source),
        }
    }

    /// Sets the length of the time slice a walk runs before yielding.
    #[must_use]
    pub const fn with_slice(mut self, slice: Duration) -> Self {
        self.slice = slice;
        self
    }

    /// Length of the time slice a walk runs before yielding.
    #[must_use]
    pub const fn slice(&self) -> Duration {
        self.slice
    }

    /// Whether reads still fall through to a clone source.
    #[must_use]
    pub const fn is_clone(&self) -> bool {
        self.clone_source.is_some()
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the nodeset holds no live node.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Revision of the baseline this nodeset was loaded from or saved as.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Sets the revision recorded when persisting.
    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }

    /// Format version of the baseline this nodeset was loaded from.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub(crate) fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    /// Reads a node, falling through to the clone source.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        match self.nodes.get(id) {
            Some(Slot::Owned(node)) => Some(node),
            Some(Slot::Tombstone) => None,
            None => self.clone_source.as_deref().and_then(|source| source.node(id)),
        }
    }

    /// Reads a node that must exist.
    pub fn get(&self, id: &NodeId) -> Result<&Node, NodesetError> {
        self.node(id).ok_or_else(|| NodesetError::NotFound(id.clone()))
    }

    /// Whether a live node with this id exists.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Obtains a node for writing, copying it out of the clone source first
    /// if it is inherited.
    pub fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, NodesetError> {
        let inherited = match self.nodes.get(id) {
            Some(Slot::Owned(_)) => None,
            Some(Slot::Tombstone) => return Err(NodesetError::NotFound(id.clone())),
            None => Some(
                self.clone_source
                    .as_deref()
                    .and_then(|source| source.node(id))
                    .cloned()
                    .ok_or_else(|| NodesetError::NotFound(id.clone()))?,
            ),
        };

        if let Some(node) = inherited {
            let _prev = self.nodes.insert(id.clone(), Slot::Owned(node));
        }

        match self.nodes.get_mut(id) {
            Some(Slot::Owned(node)) => Ok(node),
            _ => Err(NodesetError::NotFound(id.clone())),
        }
    }

    /// Stores a new live node.
    pub(crate) fn put(&mut self, node: Node) {
        let _prev = self.nodes.insert(node.id.clone(), Slot::Owned(node));
        self.len = self.len.saturating_add(1);
    }

    /// Drops a live node, leaving a tombstone if a clone source could still
    /// answer for it.
    pub(crate) fn discard(&mut self, id: &NodeId) {
        if !self.contains(id) {
            return;
        }

        if self.clone_source.is_some() {
            let _prev = self.nodes.insert(id.clone(), Slot::Tombstone);
        } else {
            let _prev = self.nodes.remove(id);
        }

        self.len = self.len.saturating_sub(1);
    }

    /// The root node.
    pub fn root(&self) -> Result<&Node, NodesetError> {
        self.get(&NodeId::root())
    }

    /// The toolbar folder named by the root, if it resolves.
    #[must_use]
    pub fn toolbar_id(&self) -> Option<NodeId> {
        self.root()
            .ok()
            .and_then(Node::toolbar_id)
            .filter(|id| self.contains(id))
    }

    /// The unfiled folder named by the root, if it resolves.
    #[must_use]
    pub fn unfiled_id(&self) -> Option<NodeId> {
        self.root()
            .ok()
            .and_then(Node::unfiled_id)
            .filter(|id| self.contains(id))
    }

    /// `name(id)` for log lines, or the bare id.
    #[must_use]
    pub fn describe(&self, id: &NodeId) -> String {
        match self.node(id).and_then(Node::name) {
            Some(name) => format!("{name}({id})"),
            None => id.to_string(),
        }
    }

    /// A random id not yet used in this nodeset.
    #[must_use]
    pub fn fresh_id(&self) -> NodeId {
        loop {
            let id = NodeId::generate();
            if !self.nodes.contains_key(&id) && !self.contains(&id) {
                return id;
            }
        }
    }

    /// Whether `ancestor` lies on the parent chain of `id`.
    pub fn has_ancestor(&self, id: &NodeId, ancestor: &NodeId) -> Result<bool, NodesetError> {
        let mut current = self.get(id)?.parent_id.clone();
        let mut steps = 0_usize;

        while let Some(parent) = current {
            if &parent == ancestor {
                return Ok(true);
            }
            steps = steps.saturating_add(1);
            if steps > self.len {
                return Err(NodesetError::Corrupt(format!("parent chain of {id} loops")));
            }
            current = self.get(&parent)?.parent_id.clone();
        }

        Ok(false)
    }

    /// The sibling following `id` in its parent's children.
    #[must_use]
    pub fn next_sibling(&self, id: &NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent_id.as_ref()?;
        let siblings = self.node(parent)?.children();
        let index = siblings.iter().position(|c| c == id)?;

        siblings.get(index.saturating_add(1)).cloned()
    }

    /// Ids reachable from `start`, parents before children, children in
    /// order. Dangling references are skipped.
    #[must_use]
    pub fn preorder(&self, start: &NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![start.clone()];

        while let Some(id) = stack.pop() {
            let Some(node) = self.node(&id) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            stack.extend(node.children().iter().rev().cloned());
            ids.push(id);
        }

        ids
    }

    pub(crate) fn begin_populate(&mut self) {
        self.claimed = Some(HashMap::new());
    }

    pub(crate) fn end_populate(&mut self) {
        self.claimed = None;
    }

    /// Adds a node enumerated from a native store.
    ///
    /// While populating, a child already claimed by another parent is
    /// dropped from this node's children, and a node id seen twice keeps its
    /// first occurrence. Both are logged and otherwise tolerated.
    pub fn add_node(&mut self, mut node: Node) {
        if let (Some(claimed), Some(children)) = (self.claimed.as_mut(), node.children.as_mut()) {
            children.retain(|child| match claimed.get(child) {
                Some(owner) => {
                    warn!(
                        child = %child,
                        parent = %node.id,
                        owner = %owner,
                        "filtering child already claimed by another folder"
                    );
                    false
                }
                None => {
                    let _prev = claimed.insert(child.clone(), node.id.clone());
                    true
                }
            });
        }

        if let Some(existing) = self.node(&node.id) {
            warn!(
                id = %node.id,
                parent = ?node.parent_id,
                existing_parent = ?existing.parent_id,
                "node already exists; keeping the first occurrence"
            );
            return;
        }

        self.put(node);
    }

    /// Checks the tree invariants: every child resolves, lists its parent
    /// as `parent_id` and appears once; no node is reached twice.
    pub fn validate(&self) -> Result<(), NodesetError> {
        let root = NodeId::root();
        if self.root()?.parent_id.is_some() {
            return Err(NodesetError::Corrupt("root has a parent".to_owned()));
        }

        let mut seen = HashSet::from([root.clone()]);
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let node = self.get(&id)?;
            for child in node.children() {
                let Some(child_node) = self.node(child) else {
                    return Err(NodesetError::Corrupt(format!(
                        "{id} lists missing child {child}"
                    )));
                };
                if child_node.parent_id.as_ref() != Some(&id) {
                    return Err(NodesetError::Corrupt(format!(
                        "{child} is listed by {id} but names {:?} as parent",
                        child_node.parent_id
                    )));
                }
                if !seen.insert(child.clone()) {
                    return Err(NodesetError::Corrupt(format!("{child} is reached twice")));
                }
                stack.push(child.clone());
            }
        }

        Ok(())
    }

    /// Copies every inherited node still reachable from the root into this
    /// nodeset and drops the clone source.
    pub async fn declone(&mut self) -> Result<(), NodesetError> {
        if self.clone_source.is_none() {
            return Ok(());
        }

        self.on_tree(
            |nodeset, id, _| nodeset.node_mut(id).map(|_| ()),
            None,
            Order::BreadthFirst,
        )
        .await?;

        self.clone_source = None;
        self.nodes.retain(|_, slot| matches!(slot, Slot::Owned(_)));
        self.len = self.nodes.len();

        debug!(len = self.len, "decloned nodeset");

        Ok(())
    }
}
