//! Reference native store for marksync.
//!
//! [`MemoryStore`] wraps a small JSON bookmark database ([`NativeTree`]) and
//! implements the [`Datasource`](marksync_nodeset::Datasource) and
//! [`StoreAdapter`](marksync_nodeset::StoreAdapter) seams over it, keeping
//! native ids and node ids apart through an [`IdMap`].

#![forbid(unsafe_code)]
#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::missing_assert_message,
        clippy::panic,
        clippy::unwrap_used,
        reason = "Not useful in unit tests"
    )
)]

pub mod idmap;
pub mod memory;
pub mod native;

pub use idmap::IdMap;
pub use memory::MemoryStore;
pub use native::{NativeEntry, NativeKind, NativeTree};
