#[cfg(test)]
#[path = "tests/command.rs"]
mod tests;

use core::fmt::{self, Display, Formatter};
use core::slice;
use std::vec;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::id::NodeId;
use crate::node::{Attributes, NodeKind, STRUCTURAL_KEYS};

/// Action tag of a command on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Insert,
    Delete,
    Move,
    Reorder,
    Update,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Reorder => "reorder",
            Self::Update => "update",
        })
    }
}

/// One edit of a tree.
///
/// `before_id` of `None` means "append to the end of the parent's children".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCommand", into = "WireCommand")]
pub enum Command {
    /// Create a node. Only the root may be inserted without a parent.
    Insert {
        id: NodeId,
        parent_id: Option<NodeId>,
        before_id: Option<NodeId>,
        kind: NodeKind,
        attrs: Attributes,
    },
    /// Unlink a node and drop its whole subtree.
    Delete { id: NodeId },
    /// Relink a node under another parent.
    Move {
        id: NodeId,
        parent_id: NodeId,
        before_id: Option<NodeId>,
    },
    /// Relink a node at another position under its current parent.
    Reorder {
        id: NodeId,
        before_id: Option<NodeId>,
    },
    /// Set truthy attributes, clear falsy ones.
    Update { id: NodeId, attrs: Attributes },
}

impl Command {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Insert { .. } => Action::Insert,
            Self::Delete { .. } => Action::Delete,
            Self::Move { .. } => Action::Move,
            Self::Reorder { .. } => Action::Reorder,
            Self::Update { .. } => Action::Update,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &NodeId {
        match self {
            Self::Insert { id, .. }
            | Self::Delete { id }
            | Self::Move { id, .. }
            | Self::Reorder { id, .. }
            | Self::Update { id, .. } => id,
        }
    }

    /// Parent named by the command itself, if the action carries one.
    #[must_use]
    pub const fn parent_id(&self) -> Option<&NodeId> {
        match self {
            Self::Insert { parent_id, .. } => parent_id.as_ref(),
            Self::Move { parent_id, .. } => Some(parent_id),
            Self::Delete { .. } | Self::Reorder { .. } | Self::Update { .. } => None,
        }
    }

    #[must_use]
    pub const fn before_id(&self) -> Option<&NodeId> {
        match self {
            Self::Insert { before_id, .. }
            | Self::Move { before_id, .. }
            | Self::Reorder { before_id, .. } => before_id.as_ref(),
            Self::Delete { .. } | Self::Update { .. } => None,
        }
    }

    /// Replaces the insert-before sibling. No effect on actions without one.
    pub fn set_before_id(&mut self, before: Option<NodeId>) {
        match self {
            Self::Insert { before_id, .. }
            | Self::Move { before_id, .. }
            | Self::Reorder { before_id, .. } => *before_id = before,
            Self::Delete { .. } | Self::Update { .. } => {}
        }
    }
}

#[derive(Clone, Copy, Debug, Error)]
#[non_exhaustive]
pub enum CommandError {
    /// The command has no target id.
    #[error("{0} command without a target id")]
    MissingId(Action),

    /// A required argument is absent.
    #[error("{action} command is missing `{arg}`")]
    MissingArg { action: Action, arg: &'static str },

    /// An argument has the wrong shape.
    #[error("{action} command has an invalid `{arg}`")]
    InvalidArg { action: Action, arg: &'static str },
}

/// Command as exchanged with a remote party: `{action, nid, args}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireCommand {
    pub action: Action,
    pub nid: NodeId,
    #[serde(default)]
    pub args: Attributes,
}

impl TryFrom<WireCommand> for Command {
    type Error = CommandError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        let WireCommand {
            action,
            nid: id,
            mut args,
        } = wire;

        if id.is_empty() {
            return Err(CommandError::MissingId(action));
        }

        let parent_id = take_id(&mut args, action, "pnid")?;
        let before_id = take_id(&mut args, action, "bnid")?;

        let command = match action {
            Action::Insert => {
                let kind = match args.remove("ntype") {
                    None | Some(Value::Null) => NodeKind::default(),
                    Some(Value::String(kind)) => NodeKind::from(kind),
                    Some(_) => return Err(CommandError::InvalidArg { action, arg: "ntype" }),
                };
                strip_structural(&mut args);

                Self::Insert {
                    id,
                    parent_id,
                    before_id,
                    kind,
                    attrs: args,
                }
            }
            Action::Delete => Self::Delete { id },
            Action::Move => Self::Move {
                id,
                parent_id: parent_id.ok_or(CommandError::MissingArg { action, arg: "pnid" })?,
                before_id,
            },
            Action::Reorder => Self::Reorder { id, before_id },
            Action::Update => {
                strip_structural(&mut args);
                Self::Update { id, attrs: args }
            }
        };

        Ok(command)
    }
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        let action = command.action();

        let (nid, args) = match command {
            Command::Insert {
                id,
                parent_id,
                before_id,
                kind,
                mut attrs,
            } => {
                let _prev = attrs.insert("ntype".to_owned(), Value::String(kind.into()));
                put_id(&mut attrs, "pnid", parent_id);
                put_id(&mut attrs, "bnid", before_id);
                (id, attrs)
            }
            Command::Delete { id } => (id, Attributes::new()),
            Command::Move {
                id,
                parent_id,
                before_id,
            } => {
                let mut args = Attributes::new();
                put_id(&mut args, "pnid", Some(parent_id));
                put_id(&mut args, "bnid", before_id);
                (id, args)
            }
            Command::Reorder { id, before_id } => {
                let mut args = Attributes::new();
                put_id(&mut args, "bnid", before_id);
                (id, args)
            }
            Command::Update { id, attrs } => (id, attrs),
        };

        Self { action, nid, args }
    }
}

fn take_id(
    args: &mut Attributes,
    action: Action,
    arg: &'static str,
) -> Result<Option<NodeId>, CommandError> {
    match args.remove(arg) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) if id.is_empty() => Ok(None),
        Some(Value::String(id)) => Ok(Some(NodeId::from(id))),
        Some(_) => Err(CommandError::InvalidArg { action, arg }),
    }
}

fn put_id(args: &mut Attributes, arg: &str, id: Option<NodeId>) {
    if let Some(id) = id {
        let _prev = args.insert(arg.to_owned(), Value::String(id.into()));
    }
}

fn strip_structural(args: &mut Attributes) {
    for key in STRUCTURAL_KEYS {
        let _prev = args.remove(key);
    }
}

/// Ordered edit script, in generation order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Commandset {
    commands: Vec<Command>,
}

impl Commandset {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Command> {
        self.commands.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Command] {
        &self.commands
    }

    /// The same commands, last generated first.
    #[must_use]
    pub fn reversed(&self) -> Self {
        self.commands.iter().rev().cloned().collect()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Command> {
        self.commands
    }
}

impl Extend<Command> for Commandset {
    fn extend<T: IntoIterator<Item = Command>>(&mut self, iter: T) {
        self.commands.extend(iter);
    }
}

impl FromIterator<Command> for Commandset {
    fn from_iter<T: IntoIterator<Item = Command>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Command>> for Commandset {
    fn from(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

impl IntoIterator for Commandset {
    type Item = Command;
    type IntoIter = vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

impl<'a> IntoIterator for &'a Commandset {
    type Item = &'a Command;
    type IntoIter = slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
