//! Durable baselines and the round trip through a native store.

#[cfg(test)]
#[path = "tests/baseline.rs"]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use marksync_primitives::id::NodeId;
use marksync_primitives::node::{Node, NAME};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, error, info};

use crate::adapter::StoreAdapter;
use crate::error::NodesetError;
use crate::nodeset::Nodeset;

/// Format version written to baseline files.
pub const BASELINE_VERSION: &str = "1";

#[derive(Serialize)]
struct BaselineRef<'a> {
    version: &'a str,
    #[serde(rename = "currentRevision")]
    current_revision: u64,
    #[serde(rename = "_node")]
    nodes: BTreeMap<&'a NodeId, &'a Node>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBaseline {
    Versioned {
        version: String,
        #[serde(rename = "currentRevision", default)]
        current_revision: u64,
        #[serde(rename = "_node")]
        nodes: HashMap<NodeId, Node>,
    },
    /// Files written before versioning hold the bare node map.
    Legacy(HashMap<NodeId, Node>),
}

impl Nodeset {
    /// Encodes the nodes reachable from the root as a baseline document.
    pub fn to_json(&self) -> Result<String, NodesetError> {
        if self.is_clone() {
            return Err(NodesetError::StillCloned);
        }

        let reachable = self.preorder(&NodeId::root());
        let nodes = reachable
            .iter()
            .filter_map(|id| self.node(id).map(|node| (id, node)))
            .collect();

        let document = BaselineRef {
            version: BASELINE_VERSION,
            current_revision: self.revision(),
            nodes,
        };

        Ok(serde_json::to_string(&document)?)
    }

    /// Decodes a baseline document, versioned or legacy.
    pub fn from_json(json: &str) -> Result<Self, NodesetError> {
        let (version, revision, nodes) = match serde_json::from_str(json)? {
            StoredBaseline::Versioned {
                version,
                current_revision,
                nodes,
            } => (Some(version), current_revision, nodes),
            StoredBaseline::Legacy(nodes) => (None, 0, nodes),
        };

        let mut nodeset = Self::new();
        nodeset.set_version(version);
        nodeset.set_revision(revision);

        let mut nodes: Vec<(NodeId, Node)> = nodes.into_iter().collect();
        nodes.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (id, mut node) in nodes {
            // The map key is authoritative; older writers left `nid` out.
            node.id = id;
            nodeset.put(node);
        }

        Ok(nodeset)
    }

    /// Writes the baseline to `path`, replacing the previous file only once
    /// the new one is complete.
    pub async fn save(&self, path: &Path) -> Result<(), NodesetError> {
        let json = self.to_json()?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");

        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;

        info!(path = %path.display(), revision = self.revision(), len = self.len(), "saved baseline");

        Ok(())
    }

    /// Reads the baseline at `path`.
    pub async fn load(path: &Path) -> Result<Self, NodesetError> {
        let json = fs::read_to_string(path).await?;
        let nodeset = Self::from_json(&json)?;

        debug!(
            path = %path.display(),
            version = ?nodeset.version(),
            revision = nodeset.revision(),
            len = nodeset.len(),
            "loaded baseline"
        );

        Ok(nodeset)
    }

    /// Populates a nodeset from the native store.
    ///
    /// When a `baseline` is given, whatever the store could not represent
    /// is restored from it with fallback, and the root name is reset to the
    /// baseline's, or dropped when the baseline root has none. A populated tree that fails validation is reported as
    /// corrupt.
    pub async fn fetch_from_native<A>(
        adapter: &mut A,
        baseline: Option<&Self>,
    ) -> Result<Self, NodesetError>
    where
        A: StoreAdapter + ?Sized,
    {
        let mut nodeset = Self::new();
        if let Some(baseline) = baseline {
            nodeset = nodeset.with_slice(baseline.slice());
        }

        nodeset.begin_populate();
        let populated = {
            let mut sink = |node: Node| nodeset.add_node(node);
            adapter.provide_nodes(&mut sink).await
        };
        nodeset.end_populate();
        populated?;

        if let Some(baseline) = baseline {
            let restore = baseline.unrepresentable_commands(&*adapter)?;
            let applied = nodeset.apply_with_fallback(&restore, baseline, &*adapter);
            debug!(commands = restore.len(), applied, "restored unrepresentable content");

            let name = baseline
                .root()
                .ok()
                .and_then(|root| root.attr(NAME))
                .filter(|name| name.as_str().map_or(!name.is_null(), |name| !name.is_empty()))
                .cloned();
            let root = nodeset.node_mut(&NodeId::root())?;
            let _prev = match name {
                Some(name) => root.attrs.insert(NAME.to_owned(), name),
                None => root.attrs.remove(NAME),
            };
        }

        if let Err(err) = nodeset.validate() {
            error!(%err, "populated tree is corrupt");
            return Err(match err {
                NodesetError::Corrupt(_) => err,
                other => NodesetError::Corrupt(other.to_string()),
            });
        }

        info!(len = nodeset.len(), "fetched nodes from native store");

        Ok(nodeset)
    }

    /// Hands the nodeset to the native store.
    pub async fn flush_to_native<A>(&self, adapter: &mut A) -> Result<(), NodesetError>
    where
        A: StoreAdapter + ?Sized,
    {
        adapter.accept_nodes(self).await?;
        debug!(len = self.len(), "flushed nodes to native store");
        Ok(())
    }

    /// Removes every entry of the native store.
    pub async fn clear_native<A>(adapter: &mut A) -> Result<(), NodesetError>
    where
        A: StoreAdapter + ?Sized,
    {
        adapter.clear_local_store().await?;
        info!("cleared native store");
        Ok(())
    }
}
