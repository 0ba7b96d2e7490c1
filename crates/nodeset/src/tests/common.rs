use std::collections::HashSet;

use async_trait::async_trait;
use marksync_primitives::command::Command;
use marksync_primitives::id::NodeId;
use marksync_primitives::node::{Attributes, Node, NodeKind, TOOLBAR_ID};
use serde_json::Value;

use crate::adapter::{ConflictWinner, Datasource, StoreAdapter};
use crate::error::StoreError;
use crate::nodeset::Nodeset;
use crate::policy::AttributePolicy;

pub fn id(id: &str) -> NodeId {
    NodeId::new(id)
}

pub fn ids(ids: &[&str]) -> Vec<NodeId> {
    ids.iter().map(|&child| NodeId::new(child)).collect()
}

/// A nodeset holding only an empty root folder.
pub fn empty_tree() -> Nodeset {
    let mut nodeset = Nodeset::new();
    nodeset
        .execute(&Command::Insert {
            id: NodeId::root(),
            parent_id: None,
            before_id: None,
            kind: NodeKind::Folder,
            attrs: Node::folder("ROOT", "Bookmarks").attrs,
        })
        .expect("root insert");
    nodeset
}

/// Appends `node` under `parent`.
pub fn add(nodeset: &mut Nodeset, parent: &str, node: Node) {
    nodeset
        .execute(&Command::Insert {
            id: node.id.clone(),
            parent_id: Some(id(parent)),
            before_id: None,
            kind: node.kind.clone(),
            attrs: node.attrs,
        })
        .expect("fixture insert");
}

/// ```text
/// ROOT (tnid = tb)
/// ├── tb "Toolbar"
/// │   └── b1 "One" http://one
/// ├── f "Folder"
/// │   ├── b2 "Two" http://two
/// │   └── b3 "Three" http://three
/// └── b4 "Four" http://four
/// ```
pub fn sample_tree() -> Nodeset {
    let mut nodeset = empty_tree();

    add(&mut nodeset, "ROOT", Node::folder("tb", "Toolbar"));
    add(&mut nodeset, "tb", Node::bookmark("b1", "One", "http://one"));
    add(&mut nodeset, "ROOT", Node::folder("f", "Folder"));
    add(&mut nodeset, "f", Node::bookmark("b2", "Two", "http://two"));
    add(&mut nodeset, "f", Node::bookmark("b3", "Three", "http://three"));
    add(&mut nodeset, "ROOT", Node::bookmark("b4", "Four", "http://four"));

    nodeset
        .execute(&Command::Update {
            id: NodeId::root(),
            attrs: Attributes::from([(TOOLBAR_ID.to_owned(), Value::from("tb"))]),
        })
        .expect("toolbar pointer");

    nodeset
}

pub fn children(nodeset: &Nodeset, parent: &str) -> Vec<NodeId> {
    nodeset.get(&id(parent)).expect("parent exists").children().to_vec()
}

/// Checks that every reachable child names its parent and appears once.
pub fn assert_consistent(nodeset: &Nodeset) {
    if let Err(err) = nodeset.validate() {
        panic!("tree invariants violated: {err}");
    }
}

#[derive(Debug)]
pub struct MockDatasource {
    pub policy: AttributePolicy,
    pub order_matters: bool,
    pub winner: ConflictWinner,
    pub unstorable: HashSet<NodeId>,
    pub removed: Vec<NodeId>,
    pub fail_removals: bool,
}

impl Default for MockDatasource {
    fn default() -> Self {
        Self {
            policy: AttributePolicy::default(),
            order_matters: true,
            winner: ConflictWinner::Local,
            unstorable: HashSet::new(),
            removed: Vec::new(),
            fail_removals: false,
        }
    }
}

impl Datasource for MockDatasource {
    fn policy(&self) -> &AttributePolicy {
        &self.policy
    }

    fn order_is_important(&self) -> bool {
        self.order_matters
    }

    fn handle_id_conflict(&self, _local: &Node, _remote: &Node, _conflicts: &[String]) -> ConflictWinner {
        self.winner
    }

    fn can_store(&self, node: &Node) -> bool {
        !self.unstorable.contains(&node.id)
    }

    fn remove_native(&mut self, id: &NodeId) -> Result<(), StoreError> {
        if self.fail_removals {
            return Err(StoreError::Status(7));
        }
        self.removed.push(id.clone());
        Ok(())
    }
}

/// Adapter serving a fixed list of nodes.
#[derive(Debug, Default)]
pub struct MockAdapter {
    pub datasource: MockDatasource,
    pub native: Vec<Node>,
    pub accepted: Option<usize>,
    pub cleared: bool,
    pub fail_with: Option<i32>,
}

impl Datasource for MockAdapter {
    fn policy(&self) -> &AttributePolicy {
        self.datasource.policy()
    }

    fn can_store(&self, node: &Node) -> bool {
        self.datasource.can_store(node)
    }

    fn remove_native(&mut self, id: &NodeId) -> Result<(), StoreError> {
        self.datasource.remove_native(id)
    }
}

#[async_trait]
impl StoreAdapter for MockAdapter {
    async fn provide_nodes(&mut self, sink: &mut (dyn FnMut(Node) + Send)) -> Result<(), StoreError> {
        if let Some(status) = self.fail_with {
            return Err(StoreError::Status(status));
        }
        for node in &self.native {
            sink(node.clone());
        }
        Ok(())
    }

    async fn accept_nodes(&mut self, nodeset: &Nodeset) -> Result<(), StoreError> {
        if let Some(status) = self.fail_with {
            return Err(StoreError::Status(status));
        }
        self.accepted = Some(nodeset.len());
        Ok(())
    }

    async fn clear_local_store(&mut self) -> Result<(), StoreError> {
        self.native.clear();
        self.cleared = true;
        Ok(())
    }
}

/// The nodes of `nodeset` in the form a native store would enumerate them.
pub fn native_nodes(nodeset: &Nodeset) -> Vec<Node> {
    nodeset
        .preorder(&NodeId::root())
        .iter()
        .map(|node_id| nodeset.get(node_id).expect("reachable").clone())
        .collect()
}
