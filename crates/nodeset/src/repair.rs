//! Reconciliation of a local tree against per-node snapshots.

#[cfg(test)]
#[path = "tests/repair.rs"]
mod tests;

use indexmap::IndexMap;
use marksync_primitives::command::{Command, Commandset};
use marksync_primitives::id::NodeId;
use marksync_primitives::node::Node;
use tracing::{debug, info, warn};

use crate::adapter::Datasource;
use crate::error::NodesetError;
use crate::nodeset::Nodeset;

/// Commands produced by [`Nodeset::process_hash_updates`].
#[derive(Clone, Debug, Default)]
pub struct Repair {
    /// Commands that brought the local tree in line with the snapshots,
    /// already applied to it.
    pub commands: Commandset,
    /// Inserts re-creating every deleted subtree, parents first.
    pub reinsert: Commandset,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Fate {
    Keep,
    Delete,
}

impl Nodeset {
    /// Makes the linkage and mutable attributes of the local tree match
    /// `updates`, the nodes as another replica says they should look.
    ///
    /// A node that a snapshot parent no longer lists, and that no snapshot
    /// lists or describes, is deleted along with everything still under it. Unknown snapshot ids are inserted under
    /// the root before anything is relinked.
    pub fn process_hash_updates<D>(
        &mut self,
        updates: &[Node],
        datasource: &D,
    ) -> Result<Repair, NodesetError>
    where
        D: Datasource + ?Sized,
    {
        let root = NodeId::root();
        let mut repair = Repair::default();
        let fates = self.fates(updates);

        for snapshot in updates {
            if self.contains(&snapshot.id) {
                continue;
            }

            debug!(id = %snapshot.id, "inserting unknown node as an orphan");
            self.record(
                &mut repair.commands,
                Command::Insert {
                    id: snapshot.id.clone(),
                    parent_id: Some(root.clone()),
                    before_id: None,
                    kind: snapshot.kind.clone(),
                    attrs: snapshot.safe_attrs(),
                },
            )?;
        }

        for snapshot in updates {
            let changes = datasource
                .policy()
                .mutable_changes(self.get(&snapshot.id)?, snapshot);
            if !changes.is_empty() {
                self.record(
                    &mut repair.commands,
                    Command::Update {
                        id: snapshot.id.clone(),
                        attrs: changes,
                    },
                )?;
            }

            self.relink_children(snapshot, &mut repair.commands);
        }

        for (id, fate) in &fates {
            if *fate != Fate::Delete || !self.contains(id) {
                continue;
            }
            if self.has_doomed_ancestor(id, &fates) {
                debug!(%id, "delete covered by an ancestor's delete");
                continue;
            }

            self.capture_reinsert(id, &mut repair.reinsert);
            self.record(&mut repair.commands, Command::Delete { id: id.clone() })?;
        }

        info!(
            snapshots = updates.len(),
            commands = repair.commands.len(),
            reinsert = repair.reinsert.len(),
            "processed hash updates"
        );

        Ok(repair)
    }

    /// Snapshot nodes and the children they list are kept; local children of
    /// a snapshot node that no snapshot names are deleted.
    fn fates(&self, updates: &[Node]) -> IndexMap<NodeId, Fate> {
        let mut fates = IndexMap::new();

        for snapshot in updates {
            let _prev = fates.insert(snapshot.id.clone(), Fate::Keep);
            for child in snapshot.children() {
                let _prev = fates.insert(child.clone(), Fate::Keep);
            }
        }

        for snapshot in updates {
            if snapshot.children.is_none() {
                continue;
            }
            let Some(local) = self.node(&snapshot.id) else {
                continue;
            };
            for child in local.children() {
                let _fate = fates.entry(child.clone()).or_insert(Fate::Delete);
            }
        }

        fates
    }

    /// Places the snapshot's children under it in the listed order, last
    /// first so every child can be put before its already placed successor.
    fn relink_children(&mut self, snapshot: &Node, commands: &mut Commandset) {
        let parent_id = &snapshot.id;
        let wanted: Vec<&NodeId> = snapshot
            .children()
            .iter()
            .filter(|child| {
                let live = self.contains(child) && *child != parent_id;
                if !live {
                    warn!(child = %child, parent = %parent_id, "snapshot lists a missing child; skipping");
                }
                live
            })
            .collect();

        let mut before_id: Option<NodeId> = None;

        for child in wanted.into_iter().rev() {
            let current_parent = self.node(child).and_then(|node| node.parent_id.as_ref());

            let command = if current_parent != Some(parent_id) {
                Some(Command::Move {
                    id: child.clone(),
                    parent_id: parent_id.clone(),
                    before_id: before_id.clone(),
                })
            } else if self.next_sibling(child) != before_id {
                Some(Command::Reorder {
                    id: child.clone(),
                    before_id: before_id.clone(),
                })
            } else {
                None
            };

            if let Some(command) = command {
                if let Err(err) = self.record(commands, command) {
                    warn!(child = %child, parent = %parent_id, %err, "failed to relink child");
                    continue;
                }
            }

            before_id = Some(child.clone());
        }
    }

    /// Whether a node above `id` is itself about to be deleted.
    fn has_doomed_ancestor(&self, id: &NodeId, fates: &IndexMap<NodeId, Fate>) -> bool {
        let mut current = self.node(id).and_then(|node| node.parent_id.clone());
        let mut steps = 0_usize;

        while let Some(parent) = current {
            if fates.get(&parent) == Some(&Fate::Delete) {
                return true;
            }
            steps = steps.saturating_add(1);
            if steps > self.len() {
                return false;
            }
            current = self.node(&parent).and_then(|node| node.parent_id.clone());
        }

        false
    }

    /// Inserts re-creating the whole subtree at `id`, parents first.
    fn capture_reinsert(&self, id: &NodeId, reinsert: &mut Commandset) {
        let mut stack = vec![id.clone()];

        while let Some(next) = stack.pop() {
            let Some(node) = self.node(&next) else {
                continue;
            };

            reinsert.push(Command::Insert {
                id: next.clone(),
                parent_id: node.parent_id.clone(),
                before_id: None,
                kind: node.kind.clone(),
                attrs: node.safe_attrs(),
            });

            stack.extend(node.children().iter().rev().cloned());
        }
    }

    fn record(&mut self, commands: &mut Commandset, command: Command) -> Result<(), NodesetError> {
        self.execute(&command)?;
        commands.push(command);
        Ok(())
    }
}
