//! Resumable tree traversal.
//!
//! A [`Walk`] keeps its pending queue between calls to [`Walk::resume`], so a
//! long traversal can be spread over several time slices. [`Nodeset::on_tree`]
//! drives a walk to completion, yielding to the runtime between slices.

#[cfg(test)]
#[path = "tests/walk.rs"]
mod tests;

use core::time::Duration;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use marksync_primitives::id::NodeId;
use tokio::task::yield_now;
use tracing::{trace, warn};

use crate::error::NodesetError;
use crate::nodeset::Nodeset;

/// Visiting order of a walk.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Order {
    /// Parents before children, level by level.
    #[default]
    BreadthFirst,
    /// Parents before children, each subtree completed before its next
    /// sibling.
    DepthFirst,
    /// Children before parents, depth-first.
    PostOrder,
    /// Level by level, each node visited only after its children were
    /// queued. Children added by the step are not walked.
    BreadthFirstPostOrder,
}

impl Order {
    const fn is_depth_first(self) -> bool {
        matches!(self, Self::DepthFirst | Self::PostOrder)
    }

    const fn is_post_order(self) -> bool {
        matches!(self, Self::PostOrder | Self::BreadthFirstPostOrder)
    }
}

/// Outcome of one [`Walk::resume`] call.
#[derive(Debug)]
pub enum Progress {
    /// The time slice ran out with nodes still pending.
    Suspended,
    /// The walk is over, either completed or aborted by the step.
    Finished(Result<(), NodesetError>),
}

/// Traversal state that survives between time slices.
#[derive(Debug)]
pub struct Walk {
    pending: VecDeque<(NodeId, Option<NodeId>)>,
    /// Folders whose children were scheduled and which wait for their
    /// post-order visit.
    expanded: HashSet<NodeId>,
    seen: HashSet<NodeId>,
    order: Order,
    visited: usize,
}

impl Walk {
    /// A walk that starts at `start`.
    #[must_use]
    pub fn new(start: NodeId, order: Order) -> Self {
        Self {
            pending: VecDeque::from([(start, None)]),
            expanded: HashSet::new(),
            seen: HashSet::new(),
            order,
            visited: 0,
        }
    }

    /// Number of nodes handed to the step so far.
    #[must_use]
    pub const fn visited(&self) -> usize {
        self.visited
    }

    /// Whether nothing is left to visit.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Visits pending nodes until the walk ends or `slice` has elapsed.
    ///
    /// `step` receives the nodeset, the visited id and the id of the parent
    /// it was reached from. An error from `step` clears the walk and is
    /// returned as its outcome. Ids that no longer resolve when their turn
    /// comes are skipped.
    pub fn resume<F>(&mut self, nodeset: &mut Nodeset, step: &mut F, slice: Duration) -> Progress
    where
        F: FnMut(&mut Nodeset, &NodeId, Option<&NodeId>) -> Result<(), NodesetError>,
    {
        let started = Instant::now();

        while let Some((id, parent_id)) = self.pending.pop_front() {
            if !nodeset.contains(&id) {
                warn!(%id, "walk reached a node that no longer exists; skipping");
                continue;
            }

            let revisit = self.expanded.remove(&id);

            if !revisit && !self.seen.insert(id.clone()) {
                warn!(%id, "walk reached a node twice; skipping");
                continue;
            }

            if !self.order.is_post_order() || revisit {
                if let Err(err) = step(nodeset, &id, parent_id.as_ref()) {
                    self.pending.clear();
                    self.expanded.clear();
                    return Progress::Finished(Err(err));
                }
                self.visited = self.visited.saturating_add(1);
            }

            if !revisit {
                self.schedule(nodeset, id, parent_id);
            }

            if !self.pending.is_empty() && started.elapsed() >= slice {
                return Progress::Suspended;
            }
        }

        Progress::Finished(Ok(()))
    }

    fn schedule(&mut self, nodeset: &Nodeset, id: NodeId, parent_id: Option<NodeId>) {
        // The step may have deleted the node.
        let Some(node) = nodeset.node(&id) else {
            return;
        };

        let mut at = 0_usize;

        if node.is_folder() {
            for child in node.children() {
                let entry = (child.clone(), Some(id.clone()));
                if self.order.is_depth_first() {
                    self.pending.insert(at, entry);
                    at = at.saturating_add(1);
                } else {
                    self.pending.push_back(entry);
                }
            }
        }

        if self.order.is_post_order() {
            if self.order.is_depth_first() {
                self.pending.insert(at, (id.clone(), parent_id));
            } else {
                self.pending.push_back((id.clone(), parent_id));
            }
            let _new = self.expanded.insert(id);
        }
    }
}

impl Nodeset {
    /// Walks the tree from `start` (the root by default), handing every
    /// reachable node to `step`, and yields to the runtime whenever a time
    /// slice runs out.
    pub async fn on_tree<F>(
        &mut self,
        mut step: F,
        start: Option<NodeId>,
        order: Order,
    ) -> Result<(), NodesetError>
    where
        F: FnMut(&mut Self, &NodeId, Option<&NodeId>) -> Result<(), NodesetError>,
    {
        let mut walk = Walk::new(start.unwrap_or_else(NodeId::root), order);

        loop {
            let slice = self.slice();
            match walk.resume(self, &mut step, slice) {
                Progress::Suspended => {
                    trace!(visited = walk.visited(), "walk suspended");
                    yield_now().await;
                }
                Progress::Finished(result) => return result,
            }
        }
    }
}
