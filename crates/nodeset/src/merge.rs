//! Folding one tree into another without losing anything from either.

#[cfg(test)]
#[path = "tests/merge.rs"]
mod tests;

use std::borrow::Cow;

use marksync_primitives::command::Command;
use marksync_primitives::id::NodeId;
use marksync_primitives::node::{Node, NodeKind, FEED_URL, GENERATED_URI, TOOLBAR_ID, UNFILED_ID, URL};
use serde_json::Value;
use tracing::{debug, info};

use crate::adapter::Datasource;
use crate::error::NodesetError;
use crate::nodeset::Nodeset;

/// Counts of what a merge did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MergeStats {
    /// Source nodes matched to an existing destination node.
    pub matched: usize,
    /// Nodes copied over from the source under fresh ids.
    pub replicated: usize,
}

/// Secondary roots of the source that were copied over.
#[derive(Debug, Default)]
struct Replicas {
    toolbar: Option<NodeId>,
    unfiled: Option<NodeId>,
}

impl Nodeset {
    /// Merges `source` into `self`.
    ///
    /// Folders are matched pairwise from the roots down (and from the
    /// toolbar and unfiled folders, when both trees have them). Each source
    /// child is matched to the best remaining destination child; a match
    /// only gains attributes the destination lacks, and an unmatched source
    /// subtree is copied in under fresh ids.
    pub fn merge<D>(&mut self, source: &Self, datasource: &D) -> Result<MergeStats, NodesetError>
    where
        D: Datasource + ?Sized,
    {
        let root = NodeId::root();
        let dest_toolbar = self.toolbar_id();
        let dest_unfiled = self.unfiled_id();
        let source_toolbar = source.toolbar_id();
        let source_unfiled = source.unfiled_id();

        let mut pairs = vec![(root.clone(), root.clone())];
        // Source secondary roots merged as their own pair, never as plain
        // children.
        let mut paired = Vec::new();

        if let (Some(dest), Some(src)) = (&dest_toolbar, &source_toolbar) {
            pairs.push((dest.clone(), src.clone()));
            paired.push(src.clone());
        }
        if let (Some(dest), Some(src)) = (&dest_unfiled, &source_unfiled) {
            pairs.push((dest.clone(), src.clone()));
            paired.push(src.clone());
        }

        let reserved: Vec<NodeId> = [dest_toolbar, dest_unfiled]
            .into_iter()
            .flatten()
            .collect();
        let special: Vec<NodeId> = [source_toolbar.clone(), source_unfiled.clone()]
            .into_iter()
            .flatten()
            .collect();

        let mut stats = MergeStats::default();
        let mut replicas = Replicas::default();

        while let Some((ours_id, theirs_id)) = pairs.pop() {
            let mut candidates = self.get(&ours_id)?.children().to_vec();
            candidates.retain(|id| !reserved.contains(id));
            let theirs = source.get(&theirs_id)?.children().to_vec();

            debug!(
                dest = %self.describe(&ours_id),
                source = %source.describe(&theirs_id),
                "merging folder pair"
            );

            for their_child in &theirs {
                if paired.contains(their_child) {
                    continue;
                }

                let their_node = source.get(their_child)?;
                let found = if special.contains(their_child) {
                    None
                } else {
                    self.best_match(their_node, &candidates, datasource)
                };

                match found {
                    Some(index) => {
                        let matched = candidates.remove(index);
                        if self.get(&matched)?.is_folder() {
                            pairs.push((matched, their_child.clone()));
                        } else {
                            self.node_mut(&matched)?.merge_from(their_node);
                        }
                        stats.matched = stats.matched.saturating_add(1);
                    }
                    None => {
                        let copied = self.replicate(
                            source,
                            their_child,
                            &ours_id,
                            &paired,
                            (source_toolbar.as_ref(), source_unfiled.as_ref()),
                            &mut replicas,
                        )?;
                        stats.replicated = stats.replicated.saturating_add(copied);
                    }
                }
            }
        }

        if self.root()?.toolbar_id().is_none() {
            if let Some(toolbar) = replicas.toolbar {
                let _prev = self
                    .node_mut(&root)?
                    .attrs
                    .insert(TOOLBAR_ID.to_owned(), Value::String(toolbar.into()));
            }
        }
        if self.root()?.unfiled_id().is_none() {
            if let Some(unfiled) = replicas.unfiled {
                let _prev = self
                    .node_mut(&root)?
                    .attrs
                    .insert(UNFILED_ID.to_owned(), Value::String(unfiled.into()));
            }
        }

        info!(
            matched = stats.matched,
            replicated = stats.replicated,
            "merge finished"
        );

        Ok(stats)
    }

    /// Index in `candidates` of the destination node that best matches
    /// `theirs`. Equal names score two, an identical id one more; the first
    /// candidate wins a tie.
    fn best_match<D>(&self, theirs: &Node, candidates: &[NodeId], datasource: &D) -> Option<usize>
    where
        D: Datasource + ?Sized,
    {
        let their_url = link_key(theirs, datasource);
        let their_name = normalized_name(theirs);

        let mut best: Option<(usize, u8)> = None;

        for (index, candidate_id) in candidates.iter().enumerate() {
            let Some(ours) = self.node(candidate_id) else {
                continue;
            };
            if ours.kind != theirs.kind || link_key(ours, datasource) != their_url {
                continue;
            }

            let same_name = normalized_name(ours) == their_name;
            if ours.is_folder() && !same_name {
                continue;
            }

            let score = u8::from(same_name) * 2 + u8::from(ours.id == theirs.id);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }

        best.map(|(index, _)| index)
    }

    /// Copies the subtree of `source` at `id` under `parent_id` with fresh
    /// ids. Returns the number of nodes copied.
    fn replicate(
        &mut self,
        source: &Self,
        id: &NodeId,
        parent_id: &NodeId,
        paired: &[NodeId],
        (source_toolbar, source_unfiled): (Option<&NodeId>, Option<&NodeId>),
        replicas: &mut Replicas,
    ) -> Result<usize, NodesetError> {
        let mut copied = 0_usize;
        let mut stack = vec![(id.clone(), parent_id.clone())];

        while let Some((source_id, dest_parent)) = stack.pop() {
            if paired.contains(&source_id) {
                continue;
            }

            let node = source.get(&source_id)?;
            let fresh = self.fresh_id();

            self.execute(&Command::Insert {
                id: fresh.clone(),
                parent_id: Some(dest_parent),
                before_id: None,
                kind: node.kind.clone(),
                attrs: node.safe_attrs(),
            })?;
            copied = copied.saturating_add(1);

            if source_toolbar == Some(&source_id) {
                replicas.toolbar = Some(fresh.clone());
            } else if source_unfiled == Some(&source_id) {
                replicas.unfiled = Some(fresh.clone());
            }

            if node.is_folder() {
                stack.extend(
                    node.children()
                        .iter()
                        .rev()
                        .map(|child| (child.clone(), fresh.clone())),
                );
            }
        }

        Ok(copied)
    }
}

fn link_key<'a, D>(node: &'a Node, datasource: &D) -> Option<Cow<'a, str>>
where
    D: Datasource + ?Sized,
{
    let attr = if node.kind == NodeKind::Feed { FEED_URL } else { URL };

    node.attr_str(attr).map(|url| datasource.normalize_url(url))
}

fn normalized_name(node: &Node) -> Option<&str> {
    match node.kind {
        NodeKind::Separator => Some(""),
        NodeKind::Microsummary => node
            .attr_str(GENERATED_URI)
            .filter(|uri| !uri.is_empty())
            .or_else(|| node.name().map(str::trim_end)),
        _ => node.name().map(str::trim_end),
    }
}
