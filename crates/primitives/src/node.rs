#[cfg(test)]
#[path = "tests/node.rs"]
mod tests;

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::id::NodeId;

/// Kind-dependent attribute bag of a node, keyed by attribute name.
pub type Attributes = BTreeMap<String, Value>;

pub const NAME: &str = "name";
pub const URL: &str = "url";
pub const FEED_URL: &str = "feedurl";
pub const GENERATED_URI: &str = "generateduri";
pub const TAGS: &str = "tags";
/// Root attribute pointing at the toolbar folder.
pub const TOOLBAR_ID: &str = "tnid";
/// Root attribute pointing at the unfiled folder.
pub const UNFILED_ID: &str = "unid";

/// Attributes that never leave the local store.
pub const PRIVATE_ATTRS: [&str; 2] = ["private", "dbkey"];

/// Keys carried beside the attribute bag on the wire.
pub const STRUCTURAL_KEYS: [&str; 6] = ["nid", "pnid", "bnid", "ntype", "children", "hash"];

#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    #[default]
    Bookmark,
    Folder,
    Separator,
    Microsummary,
    Feed,
    Query,
    Password,
    /// Kinds the core does not interpret; kept verbatim.
    Other(String),
}

impl NodeKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bookmark => "bookmark",
            Self::Folder => "folder",
            Self::Separator => "separator",
            Self::Microsummary => "microsummary",
            Self::Feed => "feed",
            Self::Query => "query",
            Self::Password => "password",
            Self::Other(kind) => kind,
        }
    }

    #[must_use]
    pub const fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

impl From<String> for NodeKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "" | "bookmark" => Self::Bookmark,
            "folder" => Self::Folder,
            "separator" => Self::Separator,
            "microsummary" => Self::Microsummary,
            "feed" => Self::Feed,
            "query" => Self::Query,
            "password" => Self::Password,
            _ => Self::Other(kind),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(kind: &str) -> Self {
        Self::from(kind.to_owned())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Other(kind) => kind,
            known => known.as_str().to_owned(),
        }
    }
}

/// One entry of the bookmark tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "nid", default, skip_serializing_if = "NodeId::is_empty")]
    pub id: NodeId,

    #[serde(
        rename = "pnid",
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<NodeId>,

    #[serde(rename = "ntype", default)]
    pub kind: NodeKind,

    /// Present only on folders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(flatten)]
    pub attrs: Attributes,
}

impl Node {
    #[must_use]
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        let children = kind.is_folder().then(Vec::new);

        Self {
            id,
            parent_id: None,
            kind,
            children,
            hash: None,
            attrs: Attributes::new(),
        }
    }

    #[must_use]
    pub fn folder(id: impl Into<NodeId>, name: &str) -> Self {
        Self::new(id.into(), NodeKind::Folder).with_attr(NAME, name)
    }

    #[must_use]
    pub fn bookmark(id: impl Into<NodeId>, name: &str, url: &str) -> Self {
        Self::new(id.into(), NodeKind::Bookmark)
            .with_attr(NAME, name)
            .with_attr(URL, url)
    }

    #[must_use]
    pub fn with_attr(mut self, attr: &str, value: impl Into<Value>) -> Self {
        let _prev = self.attrs.insert(attr.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    #[must_use]
    pub fn attr(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    #[must_use]
    pub fn attr_str(&self, attr: &str) -> Option<&str> {
        self.attrs.get(attr).and_then(Value::as_str)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.attr_str(NAME)
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.attr_str(URL)
    }

    #[must_use]
    pub fn toolbar_id(&self) -> Option<NodeId> {
        self.attr_str(TOOLBAR_ID)
            .filter(|id| !id.is_empty())
            .map(NodeId::from)
    }

    #[must_use]
    pub fn unfiled_id(&self) -> Option<NodeId> {
        self.attr_str(UNFILED_ID)
            .filter(|id| !id.is_empty())
            .map(NodeId::from)
    }

    /// Position of `child` in this folder's children.
    #[must_use]
    pub fn child_index(&self, child: &NodeId) -> Option<usize> {
        self.children
            .as_ref()
            .and_then(|children| children.iter().position(|c| c == child))
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Attributes that may be shipped to another party.
    #[must_use]
    pub fn safe_attrs(&self) -> Attributes {
        self.attrs
            .iter()
            .filter(|(attr, _)| !PRIVATE_ATTRS.contains(&attr.as_str()))
            .map(|(attr, value)| (attr.clone(), value.clone()))
            .collect()
    }

    /// Names of the fields for which an insert of (`kind`, `parent_id`,
    /// `attrs`) disagrees with this node. Empty means the insert would be a
    /// repeat of this node.
    #[must_use]
    pub fn insert_conflicts(
        &self,
        kind: &NodeKind,
        parent_id: Option<&NodeId>,
        attrs: &Attributes,
    ) -> Vec<String> {
        let mut conflicts = Vec::new();

        if &self.kind != kind {
            conflicts.push("ntype".to_owned());
        }

        if let (Some(ours), Some(theirs)) = (self.parent_id.as_ref(), parent_id) {
            if ours != theirs {
                conflicts.push("pnid".to_owned());
            }
        }

        for (attr, value) in attrs {
            match self.attrs.get(attr) {
                Some(existing) if is_truthy(existing) && existing != value => {
                    conflicts.push(attr.clone());
                }
                _ => {}
            }
        }

        conflicts
    }

    /// Fills attributes missing on this node from `other`. Existing values
    /// are kept; tag lists are unioned and sorted.
    pub fn merge_from(&mut self, other: &Self) {
        for (attr, value) in other.safe_attrs() {
            if attr == TAGS {
                if let (Some(Value::Array(ours)), Value::Array(theirs)) =
                    (self.attrs.get_mut(TAGS), &value)
                {
                    let before = ours.len();
                    for tag in theirs {
                        if !ours.contains(tag) {
                            ours.push(tag.clone());
                        }
                    }
                    if ours.len() != before {
                        ours.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
                    }
                    continue;
                }
            }

            if !self.attrs.get(&attr).is_some_and(is_truthy) {
                let _prev = self.attrs.insert(attr, value);
            }
        }
    }

    /// Textual form of a field as it enters the hash rollup.
    #[must_use]
    pub fn field_text(&self, field: &str) -> String {
        match field {
            "nid" => self.id.to_string(),
            "pnid" => self
                .parent_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "ntype" => self.kind.as_str().to_owned(),
            _ => self.attrs.get(field).map(value_text).unwrap_or_default(),
        }
    }
}

/// Whether an attribute value counts as set. `null`, `false`, `0` and `""`
/// do not.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<NodeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?;

    Ok(id.filter(|id| !id.is_empty()).map(NodeId::from))
}
