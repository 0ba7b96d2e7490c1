//! Rollup digests for change detection.

#[cfg(test)]
#[path = "tests/hash.rs"]
mod tests;

use marksync_primitives::hash::HashEntry;
use marksync_primitives::id::NodeId;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::NodesetError;
use crate::nodeset::Nodeset;
use crate::walk::Order;

/// Fields hashed when none are configured.
pub const DEFAULT_HASH_ATTRS: [&str; 5] = ["ntype", "name", "url", "tnid", "unid"];

impl Nodeset {
    /// Computes the hash of every reachable node, children before parents.
    ///
    /// A node's hash covers the values of `hash_attrs`, in order, followed
    /// by the hashes of its children, in child order.
    pub async fn hash_tree<S>(&mut self, hash_attrs: &[S]) -> Result<(), NodesetError>
    where
        S: AsRef<str>,
    {
        self.on_tree(
            |nodeset, id, _| {
                let digest = nodeset.node_digest(id, hash_attrs)?;
                if nodeset.get(id)?.hash.as_deref() != Some(digest.as_str()) {
                    nodeset.node_mut(id)?.hash = Some(digest);
                }
                Ok(())
            },
            None,
            Order::PostOrder,
        )
        .await?;

        debug!(hash = ?self.root()?.hash, "hashed tree");

        Ok(())
    }

    fn node_digest<S>(&self, id: &NodeId, hash_attrs: &[S]) -> Result<String, NodesetError>
    where
        S: AsRef<str>,
    {
        let node = self.get(id)?;
        let mut hasher = Sha256::new();

        let fields: Vec<String> = hash_attrs
            .iter()
            .map(|attr| node.field_text(attr.as_ref()))
            .collect();
        hasher.update(fields.join(",").as_bytes());

        for child in node.children() {
            hasher.update(b"_");
            let child_hash = self.node(child).and_then(|child| child.hash.as_deref());
            hasher.update(child_hash.unwrap_or_default().as_bytes());
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// The hash list of the tree, parents first. Run
    /// [`hash_tree`](Self::hash_tree) beforehand.
    pub async fn hash_list(&mut self) -> Result<Vec<HashEntry>, NodesetError> {
        let mut entries = Vec::with_capacity(self.len());

        self.on_tree(
            |nodeset, id, _| {
                let node = nodeset.get(id)?;
                entries.push(HashEntry {
                    nid: id.clone(),
                    pnid: node
                        .parent_id
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    children: node.children().to_vec(),
                    hash: node.hash.clone().unwrap_or_default(),
                });
                Ok(())
            },
            None,
            Order::BreadthFirst,
        )
        .await?;

        Ok(entries)
    }
}
