//! The native bookmark database the reference store wraps.
//!
//! Entries are addressed by numeric native ids handed out by the database.
//! Three entries always exist: the invisible root `0`, the toolbar folder
//! `1` and the "other bookmarks" folder `2`, both children of `0`.

#[cfg(test)]
#[path = "tests/native.rs"]
mod tests;

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use camino::Utf8Path;
use marksync_nodeset::StoreError;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

/// Native id of the invisible root.
pub const NATIVE_ROOT: &str = "0";
/// Native id of the toolbar folder.
pub const NATIVE_TOOLBAR: &str = "1";
/// Native id of the folder exposed as the tree root.
pub const NATIVE_OTHER: &str = "2";

const FIRST_FREE_ID: u64 = 3;

/// Kinds of entry the native database can hold.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeKind {
    Folder,
    Bookmark,
}

/// One entry of the native database.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub kind: NativeKind,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub date_added: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl NativeEntry {
    #[must_use]
    pub fn folder(id: &str, parent: Option<&str>, title: &str) -> Self {
        Self {
            id: id.to_owned(),
            parent: parent.map(ToOwned::to_owned),
            kind: NativeKind::Folder,
            title: title.to_owned(),
            url: None,
            date_added: now_millis(),
            children: Vec::new(),
        }
    }
}

/// The whole native database.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTree {
    next_id: u64,
    entries: BTreeMap<String, NativeEntry>,
}

impl Default for NativeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeTree {
    /// A database holding only the fixed folders.
    #[must_use]
    pub fn new() -> Self {
        let mut root = NativeEntry::folder(NATIVE_ROOT, None, "");
        root.children = vec![NATIVE_TOOLBAR.to_owned(), NATIVE_OTHER.to_owned()];

        let entries = [
            root,
            NativeEntry::folder(NATIVE_TOOLBAR, Some(NATIVE_ROOT), "Bookmarks Toolbar"),
            NativeEntry::folder(NATIVE_OTHER, Some(NATIVE_ROOT), "Other Bookmarks"),
        ]
        .into_iter()
        .map(|entry| (entry.id.clone(), entry))
        .collect();

        Self {
            next_id: FIRST_FREE_ID,
            entries,
        }
    }

    /// Reads the database at `path`.
    pub async fn load(path: &Utf8Path) -> Result<Self, StoreError> {
        let json = fs::read_to_string(path).await?;
        let tree: Self = serde_json::from_str(&json)?;

        debug!(%path, entries = tree.entries.len(), "loaded native tree");

        Ok(tree)
    }

    /// Writes the database to `path`.
    pub async fn save(&self, path: &Utf8Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).await?;

        debug!(%path, entries = self.entries.len(), "saved native tree");

        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&NativeEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut NativeEntry> {
        self.entries.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the entry is one of the folders the database always holds.
    #[must_use]
    pub fn is_fixed(id: &str) -> bool {
        [NATIVE_ROOT, NATIVE_TOOLBAR, NATIVE_OTHER].contains(&id)
    }

    /// Hands out an unused native id.
    pub fn allocate_id(&mut self) -> String {
        let id = self.next_id.to_string();
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Appends a new entry to the folder `parent`.
    pub fn create(
        &mut self,
        parent: &str,
        kind: NativeKind,
        title: &str,
        url: Option<&str>,
    ) -> Result<String, StoreError> {
        let id = self.allocate_id();
        let entry = NativeEntry {
            id: id.clone(),
            parent: Some(parent.to_owned()),
            kind,
            title: title.to_owned(),
            url: url.map(ToOwned::to_owned),
            date_added: now_millis(),
            children: Vec::new(),
        };

        self.get_mut(parent)
            .ok_or_else(|| StoreError::UnknownEntry(parent.to_owned()))?
            .children
            .push(id.clone());
        let _prev = self.entries.insert(id.clone(), entry);

        Ok(id)
    }

    /// Removes `id` and everything below it. Returns the removed ids.
    pub fn remove(&mut self, id: &str) -> Result<Vec<String>, StoreError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| StoreError::UnknownEntry(id.to_owned()))?;

        if let Some(parent) = entry.parent.clone() {
            if let Some(parent) = self.entries.get_mut(&parent) {
                parent.children.retain(|child| child != id);
            }
        }

        let mut removed = Vec::new();
        let mut stack = vec![id.to_owned()];
        while let Some(next) = stack.pop() {
            if let Some(entry) = self.entries.remove(&next) {
                stack.extend(entry.children);
                removed.push(next);
            }
        }

        Ok(removed)
    }

    /// Replaces the whole entry table.
    pub fn replace_entries(&mut self, entries: BTreeMap<String, NativeEntry>) {
        self.entries = entries;
    }

    /// Ids below `start`, parents first, children in order.
    #[must_use]
    pub fn descendants(&self, start: &str) -> Vec<String> {
        let mut ids = Vec::new();
        let mut stack: Vec<String> = self
            .get(start)
            .map(|entry| entry.children.iter().rev().cloned().collect())
            .unwrap_or_default();

        while let Some(id) = stack.pop() {
            if let Some(entry) = self.get(&id) {
                stack.extend(entry.children.iter().rev().cloned());
                ids.push(id);
            }
        }

        ids
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
