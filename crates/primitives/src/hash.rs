use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Per-node entry of a hash list, the wire unit for hash-based change
/// detection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HashEntry {
    pub nid: NodeId,
    /// Empty for the root.
    #[serde(default)]
    pub pnid: String,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub hash: String,
}
