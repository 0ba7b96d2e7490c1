//! Detection of locally existing copies of freshly inserted nodes.

#[cfg(test)]
#[path = "tests/duplicates.rs"]
mod tests;

use std::collections::{HashMap, HashSet};

use marksync_primitives::id::NodeId;
use tracing::{debug, warn};

use crate::adapter::Datasource;
use crate::nodeset::Nodeset;

const PATH_SEPARATOR: char = '/';

/// For every id of `inserted` (taken from `other`), looks for a node that
/// already existed in `nodeset` at the same name path and removes its native
/// entry, so the next comparison sees it deleted instead of duplicated.
///
/// Secondary roots of either tree are never removed. Failures of the
/// datasource are logged and ignored.
pub(crate) fn remove_duplicates<D>(
    nodeset: &Nodeset,
    other: &Nodeset,
    inserted: &[NodeId],
    datasource: &mut D,
) where
    D: Datasource + ?Sized,
{
    let fresh: HashSet<&NodeId> = inserted.iter().collect();
    let protected: HashSet<NodeId> = [
        other.toolbar_id(),
        nodeset.toolbar_id(),
        other.unfiled_id(),
        nodeset.unfiled_id(),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut existing = HashMap::new();
    for id in nodeset.preorder(&NodeId::root()) {
        if fresh.contains(&id) {
            continue;
        }
        if let Some(key) = path_key(nodeset, &id) {
            let _first = existing.entry(key).or_insert(id);
        }
    }

    for id in inserted {
        let Some(key) = path_key(other, id) else {
            continue;
        };
        let Some(local) = existing.get(&key) else {
            continue;
        };
        if protected.contains(local) || protected.contains(id) {
            continue;
        }

        warn!(
            duplicate = %nodeset.describe(local),
            inserted = %other.describe(id),
            "removing native entry duplicated by an insert"
        );

        if let Err(err) = datasource.remove_native(local) {
            debug!(id = %local, %err, "failed to remove native duplicate; ignoring");
        }
    }
}

/// Names from below the root down to the node, ending with the node's name
/// and, for non-folders, its url.
fn path_key(nodeset: &Nodeset, id: &NodeId) -> Option<String> {
    let node = nodeset.node(id)?;
    if id.is_root() {
        return None;
    }

    let mut key = node.name().unwrap_or_default().to_owned();
    if !node.is_folder() {
        key.push_str(node.url().unwrap_or_default());
    }

    let mut parent_id = node.parent_id.clone();
    let mut depth = 0_usize;
    while let Some(current) = parent_id {
        if current.is_root() {
            break;
        }
        let parent = nodeset.node(&current)?;
        key = format!("{}{PATH_SEPARATOR}{key}", parent.name().unwrap_or_default());
        parent_id = parent.parent_id.clone();

        depth = depth.saturating_add(1);
        if depth > nodeset.len() {
            return None;
        }
    }

    Some(key)
}
