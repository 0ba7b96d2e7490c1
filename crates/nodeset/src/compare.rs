//! Structural diff between two nodesets.

#[cfg(test)]
#[path = "tests/compare.rs"]
mod tests;

use std::collections::HashSet;

use marksync_primitives::command::{Command, Commandset};
use marksync_primitives::id::NodeId;
use tracing::{debug, error, info};

use crate::adapter::Datasource;
use crate::duplicates::remove_duplicates;
use crate::error::NodesetError;
use crate::nodeset::Nodeset;
use crate::walk::Order;

impl Nodeset {
    /// Rewrites `self` into the shape of `other` and returns the commands
    /// that did it, in the order they were applied.
    ///
    /// Runs three walks over `self`: reorders, inserts and moves
    /// (breadth-first, so parents settle before their children), then
    /// deletes, then attribute updates decided by
    /// [`Datasource::compare_nodes`]. Inserted nodes that duplicate an
    /// existing path have the older native entry removed through the
    /// datasource.
    pub async fn compare<D>(&mut self, other: &Self, datasource: &mut D) -> Result<Commandset, NodesetError>
    where
        D: Datasource + ?Sized,
    {
        let mut commands = Commandset::new();
        let order_matters = datasource.order_is_important();

        self.on_tree(
            |nodeset, id, _| {
                reconcile_children(
                    nodeset,
                    other,
                    id,
                    order_matters,
                    &mut commands,
                    &mut *datasource,
                )
            },
            None,
            Order::BreadthFirst,
        )
        .await?;

        let structural = commands.len();

        self.on_tree(
            |nodeset, id, _| {
                if other.contains(id) {
                    return Ok(());
                }
                emit(nodeset, &mut commands, Command::Delete { id: id.clone() })
            },
            None,
            Order::BreadthFirst,
        )
        .await?;

        let deletes = commands.len().saturating_sub(structural);

        self.on_tree(
            |nodeset, id, _| {
                update_attributes(nodeset, other, id, &mut commands, &*datasource).map_err(|err| {
                    NodesetError::UpdateFailed {
                        id: id.clone(),
                        source: Box::new(err),
                    }
                })
            },
            None,
            Order::BreadthFirst,
        )
        .await?;

        info!(
            commands = commands.len(),
            structural,
            deletes,
            updates = commands.len().saturating_sub(structural).saturating_sub(deletes),
            "compare finished"
        );

        Ok(commands)
    }
}

/// Applies `command` to `nodeset` and records it.
fn emit(nodeset: &mut Nodeset, commands: &mut Commandset, command: Command) -> Result<(), NodesetError> {
    nodeset.execute(&command)?;
    commands.push(command);
    Ok(())
}

/// Brings the children of folder `id` in line with `other`: order of the
/// shared children first, then the children `self` lacks, which are moved
/// in from elsewhere in the tree or inserted.
fn reconcile_children<D>(
    nodeset: &mut Nodeset,
    other: &Nodeset,
    id: &NodeId,
    order_matters: bool,
    commands: &mut Commandset,
    datasource: &mut D,
) -> Result<(), NodesetError>
where
    D: Datasource + ?Sized,
{
    let Some(node) = nodeset.node(id) else {
        return Ok(());
    };
    if !node.is_folder() {
        return Ok(());
    }
    // Gone on the other side; the delete pass takes care of it.
    let Some(theirs) = other.node(id) else {
        return Ok(());
    };

    let ours = node.children().to_vec();
    let their_children = theirs.children();

    let mut shared: Vec<NodeId> = ours
        .iter()
        .filter(|child| their_children.contains(child))
        .cloned()
        .collect();
    let membership: HashSet<&NodeId> = shared.iter().collect();
    let target: Vec<NodeId> = their_children
        .iter()
        .filter(|child| membership.contains(child))
        .cloned()
        .collect();

    if shared.len() != target.len() {
        error!(
            folder = %nodeset.describe(id),
            ours = shared.len(),
            theirs = target.len(),
            "shared children differ in count"
        );
        return Err(NodesetError::IntersectionMismatch(id.clone()));
    }

    let membership: HashSet<NodeId> = target.iter().cloned().collect();

    if order_matters {
        for (index, wanted) in target.iter().enumerate() {
            let Some(current) = shared.get(index) else {
                break;
            };
            if current == wanted {
                continue;
            }

            emit(
                nodeset,
                commands,
                Command::Reorder {
                    id: wanted.clone(),
                    before_id: Some(current.clone()),
                },
            )?;

            if let Some(from) = shared.iter().position(|child| child == wanted) {
                let moved = shared.remove(from);
                shared.insert(index, moved);
            }
        }
    }

    let mut inserted = Vec::new();

    for (index, child) in their_children.iter().enumerate() {
        let present = nodeset
            .node(id)
            .is_some_and(|node| node.child_index(child).is_some());
        if present {
            continue;
        }

        let before_id = their_children
            .iter()
            .skip(index.saturating_add(1))
            .find(|sibling| membership.contains(*sibling))
            .cloned();

        if nodeset.contains(child) {
            debug!(child = %child, folder = %id, "moving child into folder");
            emit(
                nodeset,
                commands,
                Command::Move {
                    id: child.clone(),
                    parent_id: id.clone(),
                    before_id,
                },
            )?;
        } else {
            let source = other.get(child)?;
            emit(
                nodeset,
                commands,
                Command::Insert {
                    id: child.clone(),
                    parent_id: Some(id.clone()),
                    before_id,
                    kind: source.kind.clone(),
                    attrs: source.safe_attrs(),
                },
            )?;
            inserted.push(child.clone());
        }
    }

    if !inserted.is_empty() {
        remove_duplicates(nodeset, other, &inserted, datasource);
    }

    Ok(())
}

fn update_attributes<D>(
    nodeset: &mut Nodeset,
    other: &Nodeset,
    id: &NodeId,
    commands: &mut Commandset,
    datasource: &D,
) -> Result<(), NodesetError>
where
    D: Datasource + ?Sized,
{
    let local = nodeset.get(id)?;
    let remote = other.get(id)?;

    let Some(attrs) = datasource.compare_nodes(local, remote) else {
        return Ok(());
    };

    emit(
        nodeset,
        commands,
        Command::Update {
            id: id.clone(),
            attrs,
        },
    )
}
