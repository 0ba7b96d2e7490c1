//! Errors raised by nodeset operations and by store adapters.

use std::io::Error as IoError;

use marksync_primitives::id::NodeId;
use serde_json::Error as JsonError;
use thiserror::Error;

/// Status reported for a tree found to be corrupt while populating.
pub const STATUS_CORRUPT: i32 = 1006;

/// Status reported when the update pass of a compare fails.
pub const STATUS_UPDATE_FAILED: i32 = 4;

/// Status reported for any other failure.
pub const STATUS_EXCEPTION: i32 = 3;

/// Status reported for I/O failures on the baseline file.
pub const STATUS_IO: i32 = 1009;

/// Errors that can occur while mutating or traversing a [`Nodeset`](crate::Nodeset).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NodesetError {
    /// The node does not exist in the nodeset.
    #[error("node {0} not found")]
    NotFound(NodeId),

    /// The parent named for a link does not exist, or a non-root node was
    /// inserted without one.
    #[error("parent {parent_id:?} of {id} does not exist")]
    MissingParent {
        /// Node being linked.
        id: NodeId,
        /// Parent that was named.
        parent_id: Option<NodeId>,
    },

    /// The parent already lists the child.
    #[error("{parent_id} already contains {id}")]
    DuplicateChild {
        /// Node being linked.
        id: NodeId,
        /// Parent that already lists it.
        parent_id: NodeId,
    },

    /// The insert-before sibling is not a child of the parent.
    #[error("{before_id} is not a child of {parent_id}")]
    BeforeNotFound {
        /// Sibling that was named.
        before_id: NodeId,
        /// Parent that was searched.
        parent_id: NodeId,
    },

    /// An insert names an existing node with different contents.
    #[error("insert of {id} conflicts with the existing node on {conflicts:?}")]
    InsertConflict {
        /// Node being inserted.
        id: NodeId,
        /// Names of the disagreeing fields.
        conflicts: Vec<String>,
    },

    /// A move would make a node its own ancestor.
    #[error("moving {id} under {parent_id} would create a cycle")]
    Cycle {
        /// Node being moved.
        id: NodeId,
        /// Requested parent.
        parent_id: NodeId,
    },

    /// The shared children of a folder differ in count between the two
    /// trees, meaning one side lists a child twice.
    #[error("children of {0} do not intersect consistently")]
    IntersectionMismatch(NodeId),

    /// A traversal step asked to stop the walk.
    #[error("walk aborted with status {0}")]
    Aborted(i32),

    /// The update pass of a compare failed.
    #[error("update of {id} failed: {source}")]
    UpdateFailed {
        /// Node being compared.
        id: NodeId,
        /// Underlying failure.
        #[source]
        source: Box<NodesetError>,
    },

    /// The tree violates its structural invariants.
    #[error("tree is corrupt: {0}")]
    Corrupt(String),

    /// The nodeset still reads through a clone source.
    #[error("nodeset must be decloned before it is persisted")]
    StillCloned,

    /// The store adapter reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reading or writing the baseline failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The baseline could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] JsonError),
}

impl NodesetError {
    /// Numeric status of the failure as surfaced to an orchestrating caller.
    /// Never zero.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::Aborted(status) if *status != 0 => *status,
            Self::Corrupt(_) => STATUS_CORRUPT,
            Self::UpdateFailed { .. } => STATUS_UPDATE_FAILED,
            Self::Store(err) => err.status(),
            Self::Io(_) => STATUS_IO,
            _ => STATUS_EXCEPTION,
        }
    }
}

/// Errors raised by a native store adapter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The native store rejected an operation.
    #[error("native store failed with status {0}")]
    Status(i32),

    /// No native entry is mapped to the node.
    #[error("node {0} has no native counterpart")]
    Unmapped(NodeId),

    /// The native entry does not exist.
    #[error("native entry {0} not found")]
    UnknownEntry(String),

    /// Reading or writing native data failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Native data could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] JsonError),
}

impl StoreError {
    /// Numeric status of the failure. Never zero.
    #[must_use]
    pub const fn status(&self) -> i32 {
        match self {
            Self::Status(status) if *status != 0 => *status,
            Self::Io(_) => STATUS_IO,
            _ => STATUS_EXCEPTION,
        }
    }
}
