//! Command execution.
//!
//! Every mutation of a nodeset goes through one of the primitives here, and
//! each primitive checks the tree invariants before it touches anything.

#[cfg(test)]
#[path = "tests/execute.rs"]
mod tests;

use marksync_primitives::command::{Command, Commandset};
use marksync_primitives::id::NodeId;
use marksync_primitives::node::{is_truthy, Attributes, Node, NodeKind, NAME, STRUCTURAL_KEYS, UNFILED_ID};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{ConflictWinner, Datasource};
use crate::error::NodesetError;
use crate::nodeset::Nodeset;
use crate::walk::Order;

impl Nodeset {
    /// Applies one command.
    pub fn execute(&mut self, command: &Command) -> Result<(), NodesetError> {
        let result = match command {
            Command::Insert {
                id,
                parent_id,
                before_id,
                kind,
                attrs,
            } => self.insert_node(id, parent_id.as_ref(), before_id.as_ref(), kind, attrs),
            Command::Delete { id } => self.delete_node(id),
            Command::Move {
                id,
                parent_id,
                before_id,
            } => self.move_node(id, parent_id, before_id.as_ref()),
            Command::Reorder { id, before_id } => self.reorder_node(id, before_id.as_ref()),
            Command::Update { id, attrs } => self.update_node(id, attrs),
        };

        if let Err(err) = &result {
            debug!(?command, %err, "command failed");
        }

        result
    }

    /// Applies every command in order, stopping at the first failure.
    pub fn execute_all(&mut self, commands: &Commandset) -> Result<(), NodesetError> {
        for command in commands {
            self.execute(command)?;
        }

        Ok(())
    }

    fn insert_node(
        &mut self,
        id: &NodeId,
        parent_id: Option<&NodeId>,
        before_id: Option<&NodeId>,
        kind: &NodeKind,
        attrs: &Attributes,
    ) -> Result<(), NodesetError> {
        if let Some(existing) = self.node(id) {
            let conflicts = existing.insert_conflicts(kind, parent_id, attrs);
            if !conflicts.is_empty() {
                return Err(NodesetError::InsertConflict {
                    id: id.clone(),
                    conflicts,
                });
            }

            warn!(%id, "ignoring repeated insert of an identical node");
            return Ok(());
        }

        match parent_id {
            Some(parent_id) => self.check_target(id, parent_id, before_id)?,
            None if id.is_root() => {}
            None => {
                return Err(NodesetError::MissingParent {
                    id: id.clone(),
                    parent_id: None,
                })
            }
        }

        let mut node = Node::new(id.clone(), kind.clone());
        node.attrs = attrs
            .iter()
            .filter(|(attr, _)| !STRUCTURAL_KEYS.contains(&attr.as_str()))
            .map(|(attr, value)| (attr.clone(), value.clone()))
            .collect();
        self.put(node);

        if let Some(parent_id) = parent_id {
            self.link(id, parent_id, before_id)?;
        }

        Ok(())
    }

    fn delete_node(&mut self, id: &NodeId) -> Result<(), NodesetError> {
        self.unlink(id)?;

        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            let Some(node) = self.node(&next) else {
                warn!(id = %next, "deleted subtree references a missing node");
                continue;
            };
            stack.extend(node.children().iter().cloned());
            self.discard(&next);
        }

        Ok(())
    }

    fn move_node(
        &mut self,
        id: &NodeId,
        parent_id: &NodeId,
        before_id: Option<&NodeId>,
    ) -> Result<(), NodesetError> {
        let _node = self.get(id)?;
        if !self.contains(parent_id) {
            return Err(NodesetError::MissingParent {
                id: id.clone(),
                parent_id: Some(parent_id.clone()),
            });
        }

        if id == parent_id || self.has_ancestor(parent_id, id)? {
            return Err(NodesetError::Cycle {
                id: id.clone(),
                parent_id: parent_id.clone(),
            });
        }

        self.check_target(id, parent_id, before_id)?;
        self.unlink(id)?;
        self.link(id, parent_id, before_id)
    }

    fn reorder_node(&mut self, id: &NodeId, before_id: Option<&NodeId>) -> Result<(), NodesetError> {
        let parent_id = self
            .get(id)?
            .parent_id
            .clone()
            .ok_or_else(|| NodesetError::MissingParent {
                id: id.clone(),
                parent_id: None,
            })?;

        self.move_node(id, &parent_id, before_id)
    }

    fn update_node(&mut self, id: &NodeId, attrs: &Attributes) -> Result<(), NodesetError> {
        let node = self.node_mut(id)?;

        for (attr, value) in attrs {
            if STRUCTURAL_KEYS.contains(&attr.as_str()) {
                continue;
            }
            if is_truthy(value) {
                let _prev = node.attrs.insert(attr.clone(), value.clone());
            } else {
                let _prev = node.attrs.remove(attr);
            }
        }

        Ok(())
    }

    /// Verifies that `id` can be linked under `parent_id` before `before_id`
    /// once it has left its current parent.
    fn check_target(
        &self,
        id: &NodeId,
        parent_id: &NodeId,
        before_id: Option<&NodeId>,
    ) -> Result<(), NodesetError> {
        let parent = self.node(parent_id).ok_or_else(|| NodesetError::MissingParent {
            id: id.clone(),
            parent_id: Some(parent_id.clone()),
        })?;

        let relinking = self
            .node(id)
            .is_some_and(|node| node.parent_id.as_ref() == Some(parent_id));
        if !relinking && parent.child_index(id).is_some() {
            return Err(NodesetError::DuplicateChild {
                id: id.clone(),
                parent_id: parent_id.clone(),
            });
        }

        if let Some(before_id) = before_id {
            if before_id == id || parent.child_index(before_id).is_none() {
                return Err(NodesetError::BeforeNotFound {
                    before_id: before_id.clone(),
                    parent_id: parent_id.clone(),
                });
            }
        }

        Ok(())
    }

    fn link(
        &mut self,
        id: &NodeId,
        parent_id: &NodeId,
        before_id: Option<&NodeId>,
    ) -> Result<(), NodesetError> {
        let parent = self.node_mut(parent_id)?;
        let children = parent.children.get_or_insert_with(Vec::new);

        if children.contains(id) {
            return Err(NodesetError::DuplicateChild {
                id: id.clone(),
                parent_id: parent_id.clone(),
            });
        }

        let index = match before_id {
            Some(before_id) => children
                .iter()
                .position(|child| child == before_id)
                .ok_or_else(|| NodesetError::BeforeNotFound {
                    before_id: before_id.clone(),
                    parent_id: parent_id.clone(),
                })?,
            None => children.len(),
        };
        children.insert(index, id.clone());

        self.node_mut(id)?.parent_id = Some(parent_id.clone());

        Ok(())
    }

    fn unlink(&mut self, id: &NodeId) -> Result<(), NodesetError> {
        let Some(parent_id) = self.get(id)?.parent_id.clone() else {
            debug!(%id, "unlinking a node without parent");
            return Ok(());
        };

        let parent = self.node_mut(&parent_id)?;
        match parent.child_index(id) {
            Some(index) => {
                if let Some(children) = parent.children.as_mut() {
                    let _removed = children.remove(index);
                }
            }
            None => warn!(%id, parent = %parent_id, "node is not listed by its parent"),
        }

        self.node_mut(id)?.parent_id = None;

        Ok(())
    }

    /// Replays `commands` from last to first, tolerating drift between the
    /// tree they were made for and this one.
    ///
    /// Commands whose target or parent no longer exists are skipped. An
    /// insert-before sibling that is not a live child of the parent is
    /// replaced by the next sibling, in `baseline` order, that is (or by an
    /// append when the baseline does not place the node there). An insert
    /// that collides with an existing node is settled by
    /// [`Datasource::handle_id_conflict`]. Returns the number of commands
    /// applied.
    pub fn apply_with_fallback<D>(
        &mut self,
        commands: &Commandset,
        baseline: &Self,
        datasource: &D,
    ) -> usize
    where
        D: Datasource + ?Sized,
    {
        let mut applied = 0_usize;

        for command in commands.iter().rev() {
            let mut command = command.clone();
            let id = command.id().clone();
            let is_insert = matches!(command, Command::Insert { .. });

            if !is_insert && !self.contains(&id) {
                debug!(%id, action = %command.action(), "target no longer exists; skipping");
                continue;
            }

            let parent_id = match &command {
                Command::Insert { parent_id, .. } => parent_id.clone(),
                Command::Move { parent_id, .. } => Some(parent_id.clone()),
                Command::Reorder { .. } => self.node(&id).and_then(|node| node.parent_id.clone()),
                Command::Delete { .. } | Command::Update { .. } => None,
            };

            if matches!(command, Command::Insert { .. } | Command::Move { .. }) {
                match &parent_id {
                    Some(parent_id) if self.contains(parent_id) => {}
                    None if id.is_root() => {}
                    _ => {
                        debug!(%id, parent = ?parent_id, "parent no longer exists; skipping");
                        continue;
                    }
                }
            }

            if let (Some(before_id), Some(parent_id)) = (command.before_id().cloned(), &parent_id) {
                let live = before_id != id
                    && self
                        .node(&before_id)
                        .is_some_and(|node| node.parent_id.as_ref() == Some(parent_id));
                if !live {
                    let fallback = self.fallback_before(baseline, parent_id, &id);
                    debug!(%id, %before_id, ?fallback, "replacing stale insert-before sibling");
                    command.set_before_id(fallback);
                }
            }

            match self.execute(&command) {
                Ok(()) => applied = applied.saturating_add(1),
                Err(NodesetError::InsertConflict { conflicts, .. }) => {
                    if self.settle_conflict(&command, &conflicts, datasource) {
                        applied = applied.saturating_add(1);
                    }
                }
                Err(err) => warn!(%id, %err, "skipping command that failed to apply"),
            }
        }

        applied
    }

    fn fallback_before(&self, baseline: &Self, parent_id: &NodeId, id: &NodeId) -> Option<NodeId> {
        let siblings = baseline.node(parent_id)?.children();
        let start = siblings.iter().position(|child| child == id)?.saturating_add(1);

        siblings
            .iter()
            .skip(start)
            .find(|child| {
                *child != id
                    && self
                        .node(child)
                        .is_some_and(|node| node.parent_id.as_ref() == Some(parent_id))
            })
            .cloned()
    }

    fn settle_conflict<D>(&mut self, command: &Command, conflicts: &[String], datasource: &D) -> bool
    where
        D: Datasource + ?Sized,
    {
        let Command::Insert {
            id,
            parent_id,
            before_id,
            kind,
            attrs,
        } = command
        else {
            return false;
        };

        let Some(local) = self.node(id) else {
            return false;
        };

        let mut remote = Node::new(id.clone(), kind.clone());
        remote.parent_id.clone_from(parent_id);
        remote.attrs.clone_from(attrs);

        match datasource.handle_id_conflict(local, &remote, conflicts) {
            ConflictWinner::Local => {
                info!(%id, ?conflicts, "insert conflict settled for the local node");
                false
            }
            ConflictWinner::Remote => {
                info!(%id, ?conflicts, "insert conflict settled for the remote node");
                let moved = match parent_id {
                    Some(parent_id) if local.parent_id.as_ref() != Some(parent_id) => {
                        self.move_node(id, parent_id, before_id.as_ref())
                    }
                    _ => Ok(()),
                };
                match moved.and_then(|()| self.update_node(id, attrs)) {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(%id, %err, "failed to take the remote node");
                        false
                    }
                }
            }
        }
    }

    /// Commands that put back what a native store unable to represent part
    /// of this tree would lose: the root name, the toolbar's name and
    /// position, the unfiled pointer, and every node the datasource cannot
    /// store. Meant for [`apply_with_fallback`](Self::apply_with_fallback).
    pub fn unrepresentable_commands<D>(&self, datasource: &D) -> Result<Commandset, NodesetError>
    where
        D: Datasource + ?Sized,
    {
        let root_id = NodeId::root();
        let root = self.root()?;
        let mut commands = Commandset::new();

        if let Some(name) = root.attr(NAME).filter(|name| is_truthy(name)) {
            commands.push(Command::Update {
                id: root_id.clone(),
                attrs: Attributes::from([(NAME.to_owned(), name.clone())]),
            });
        }

        if let Some(toolbar_id) = self.toolbar_id() {
            let toolbar = self.get(&toolbar_id)?;
            if let Some(name) = toolbar.attr(NAME).filter(|name| is_truthy(name)) {
                commands.push(Command::Update {
                    id: toolbar_id.clone(),
                    attrs: Attributes::from([(NAME.to_owned(), name.clone())]),
                });
            }

            let before_id = self.next_sibling(&toolbar_id);
            commands.push(match &toolbar.parent_id {
                Some(parent_id) if *parent_id != root_id => Command::Move {
                    id: toolbar_id.clone(),
                    parent_id: parent_id.clone(),
                    before_id,
                },
                _ => Command::Reorder {
                    id: toolbar_id.clone(),
                    before_id,
                },
            });
        }

        if let Some(unfiled_id) = root.unfiled_id() {
            commands.push(Command::Update {
                id: root_id.clone(),
                attrs: Attributes::from([(UNFILED_ID.to_owned(), Value::String(unfiled_id.into()))]),
            });
        }

        let mut folders = vec![root_id];
        while let Some(folder_id) = folders.pop() {
            let children = self.get(&folder_id)?.children();
            for (index, child_id) in children.iter().enumerate() {
                let Some(child) = self.node(child_id) else {
                    warn!(id = %child_id, parent = %folder_id, "dangling child reference");
                    continue;
                };

                if !datasource.can_store(child) {
                    commands.push(Command::Insert {
                        id: child_id.clone(),
                        parent_id: Some(folder_id.clone()),
                        before_id: children.get(index.saturating_add(1)).cloned(),
                        kind: child.kind.clone(),
                        attrs: datasource.safe_insert_attrs(child),
                    });
                } else if child.is_folder() {
                    folders.push(child_id.clone());
                }
            }
        }

        Ok(commands)
    }

    /// Inserts that rebuild this tree from nothing, parents first.
    pub async fn provide_commandset(&mut self) -> Result<Commandset, NodesetError> {
        let mut commands = Commandset::new();

        self.on_tree(
            |nodeset, id, _| {
                let node = nodeset.get(id)?;
                commands.push(Command::Insert {
                    id: id.clone(),
                    parent_id: node.parent_id.clone(),
                    before_id: None,
                    kind: node.kind.clone(),
                    attrs: node.safe_attrs(),
                });
                Ok(())
            },
            None,
            Order::BreadthFirst,
        )
        .await?;

        Ok(commands)
    }
}
