//! Shared data types for the bookmark tree: identifiers, nodes, edit
//! commands and the hash list wire unit.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_in_result, clippy::unwrap_used)]
#![cfg_attr(
    test,
    allow(
        clippy::missing_assert_message,
        clippy::unwrap_used,
        reason = "Not useful in unit tests"
    )
)]

pub mod command;
pub mod hash;
pub mod id;
pub mod node;
