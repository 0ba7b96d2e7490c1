//! Datasource used when trees are read from files rather than a store.

#[cfg(test)]
#[path = "tests/datasource.rs"]
mod tests;

use marksync_config::ConfigFile;
use marksync_nodeset::{AttributePolicy, Datasource, StoreError};
use marksync_primitives::id::NodeId;
use tracing::debug;

/// Carries the configured attribute policy; there is no native entry to
/// remove, so removals only record the id.
#[derive(Debug)]
pub struct OfflineDatasource {
    policy: AttributePolicy,
    order_is_important: bool,
    removed: Vec<NodeId>,
}

impl OfflineDatasource {
    pub fn new(config: &ConfigFile) -> Self {
        Self {
            policy: config.attributes.clone(),
            order_is_important: config.sync.order_is_important,
            removed: Vec::new(),
        }
    }

    /// Ids whose native entry would have been removed as duplicates.
    pub fn removed(&self) -> &[NodeId] {
        &self.removed
    }
}

impl Default for OfflineDatasource {
    fn default() -> Self {
        Self::new(&ConfigFile::default())
    }
}

impl Datasource for OfflineDatasource {
    fn policy(&self) -> &AttributePolicy {
        &self.policy
    }

    fn order_is_important(&self) -> bool {
        self.order_is_important
    }

    fn remove_native(&mut self, id: &NodeId) -> Result<(), StoreError> {
        debug!(%id, "duplicate would be removed from the native store");
        self.removed.push(id.clone());
        Ok(())
    }
}
