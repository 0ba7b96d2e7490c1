//! Attribute comparison policy of a datasource.

#[cfg(test)]
#[path = "tests/policy.rs"]
mod tests;

use std::collections::BTreeSet;

use marksync_primitives::node::{is_truthy, Attributes, Node, NodeKind, NAME};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which attributes a datasource compares, which differences matter, and
/// how cleared attributes are represented.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributePolicy {
    /// Attributes diffed by compare.
    pub comparable: BTreeSet<String>,
    /// Comparable attributes whose change alone does not warrant an update.
    pub ignorable: BTreeSet<String>,
    /// Attributes cleared by setting `""` rather than `null`.
    pub non_nullable: BTreeSet<String>,
    /// Attributes repair brings in line with a snapshot.
    pub mutable: BTreeSet<String>,
}

impl Default for AttributePolicy {
    fn default() -> Self {
        Self {
            comparable: set(&["name", "url", "tnid", "unid"]),
            ignorable: set(&["created", "visited", "modified", "private"]),
            non_nullable: set(&["name", "description", "shortcuturl"]),
            mutable: set(&["name", "url"]),
        }
    }
}

fn set(attrs: &[&str]) -> BTreeSet<String> {
    attrs.iter().map(|&attr| attr.to_owned()).collect()
}

impl AttributePolicy {
    /// The comparable attributes of `remote` that differ from `local`, or
    /// `None` when no important attribute differs.
    #[must_use]
    pub fn compare(&self, local: &Node, remote: &Node) -> Option<Attributes> {
        let mut changed = Attributes::new();
        let mut important = Vec::new();

        for attr in &self.comparable {
            let ours = local.attr(attr);
            let theirs = remote.attr(attr);

            if ours == theirs {
                continue;
            }

            let value = match theirs {
                Some(value) if is_truthy(value) => value.clone(),
                _ if self.non_nullable.contains(attr) => Value::String(String::new()),
                Some(value) => value.clone(),
                None => Value::Null,
            };

            let _prev = changed.insert(attr.clone(), value);
            if !self.ignorable.contains(attr) {
                important.push(attr.as_str());
            }
        }

        // A microsummary regenerates its name on its own.
        if local.kind == NodeKind::Microsummary && important == [NAME] {
            return None;
        }

        (!important.is_empty()).then_some(changed)
    }

    /// Mutable attributes of `snapshot` that differ from `local`, with
    /// cleared values as `null`. Unset and falsy values count as equal.
    #[must_use]
    pub fn mutable_changes(&self, local: &Node, snapshot: &Node) -> Attributes {
        self.mutable
            .iter()
            .filter_map(|attr| {
                let ours = local.attr(attr).filter(|v| is_truthy(v));
                let theirs = snapshot.attr(attr).filter(|v| is_truthy(v));
                if ours == theirs {
                    return None;
                }
                Some((attr.clone(), theirs.cloned().unwrap_or(Value::Null)))
            })
            .collect()
    }
}
