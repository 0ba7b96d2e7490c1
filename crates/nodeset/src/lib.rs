//! Bookmark tree synchronization core.
//!
//! A [`Nodeset`] holds one snapshot of a bookmark tree and hosts the
//! algorithms that keep it in line with another replica.
//!
//! ## Core Concepts
//!
//! - **Nodeset**: id-addressed node arena, optionally a copy-on-write clone
//!   of a baseline
//! - **Walk**: resumable tree traversal that yields between time slices
//! - **Compare**: structural diff that rewrites `self` into the other tree's
//!   shape while recording the [`Commandset`](marksync_primitives::command::Commandset)
//! - **Merge**: folds a second tree into `self` without overwriting anything
//! - **Hash / repair**: rollup digests and reconciliation against per-node
//!   snapshots
//! - **Datasource / StoreAdapter**: traits implemented by the native store

#![forbid(unsafe_code)]
#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]
#![warn(missing_docs)]
#![cfg_attr(
    test,
    allow(
        missing_docs,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::missing_assert_message,
        clippy::panic,
        clippy::too_many_lines,
        clippy::unwrap_used,
        reason = "Not useful in unit tests"
    )
)]

pub mod adapter;
pub mod baseline;
pub mod compare;
mod duplicates;
pub mod error;
pub mod execute;
pub mod hash;
pub mod merge;
pub mod nodeset;
pub mod policy;
pub mod repair;
pub mod walk;

pub use adapter::{ConflictWinner, Datasource, StoreAdapter};
pub use error::{NodesetError, StoreError};
pub use nodeset::Nodeset;
pub use policy::AttributePolicy;
pub use walk::{Order, Progress, Walk};

#[cfg(test)]
pub mod tests {
    pub mod common;
}
