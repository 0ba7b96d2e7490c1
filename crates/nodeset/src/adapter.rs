//! Seams implemented by the native bookmark store.

use std::borrow::Cow;

use async_trait::async_trait;
use marksync_primitives::id::NodeId;
use marksync_primitives::node::{Attributes, Node};

use crate::error::StoreError;
use crate::nodeset::Nodeset;
use crate::policy::AttributePolicy;

/// Side whose version of a node survives an id conflict.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConflictWinner {
    /// Keep the node already in the nodeset.
    Local,
    /// Take the incoming node's attributes.
    Remote,
}

/// Policy hooks of the store a nodeset is synchronized with.
pub trait Datasource {
    /// Attribute comparison policy.
    fn policy(&self) -> &AttributePolicy;

    /// Whether child order is significant. Gates the reorder pass of
    /// compare.
    fn order_is_important(&self) -> bool {
        true
    }

    /// Changed comparable attributes of `remote` relative to `local`, or
    /// `None` when nothing important changed.
    fn compare_nodes(&self, local: &Node, remote: &Node) -> Option<Attributes> {
        self.policy().compare(local, remote)
    }

    /// Decides which side wins when an insert collides with an existing
    /// node on the fields named in `conflicts`.
    fn handle_id_conflict(
        &self,
        _local: &Node,
        _remote: &Node,
        _conflicts: &[String],
    ) -> ConflictWinner {
        ConflictWinner::Local
    }

    /// Canonical form of a url for matching during merge.
    fn normalize_url<'a>(&self, url: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(url)
    }

    /// Whether the native store can represent the node.
    fn can_store(&self, _node: &Node) -> bool {
        true
    }

    /// Attributes used when the node is re-created by an insert.
    fn safe_insert_attrs(&self, node: &Node) -> Attributes {
        node.safe_attrs()
    }

    /// Removes the native entry behind `id` and forgets its mapping.
    fn remove_native(&mut self, id: &NodeId) -> Result<(), StoreError>;
}

/// Bulk operations against the native store.
#[async_trait]
pub trait StoreAdapter: Datasource + Send {
    /// Enumerates the native store, passing every entry to `sink` translated
    /// into a [`Node`].
    async fn provide_nodes(&mut self, sink: &mut (dyn FnMut(Node) + Send)) -> Result<(), StoreError>;

    /// Makes the native store match `nodeset`.
    async fn accept_nodes(&mut self, nodeset: &Nodeset) -> Result<(), StoreError>;

    /// Removes every native entry.
    async fn clear_local_store(&mut self) -> Result<(), StoreError>;
}
