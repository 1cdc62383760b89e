//! statdb-core - shared types of the stats store.
//!
//! Defines tree addressing ([`Path`]), the per-level schema
//! ([`NodeSchema`]), the value contract ([`Container`]), the tree itself
//! ([`StatsTree`]) and the sync batch types exchanged between a satellite
//! node and the master.

pub mod container;
pub mod error;
pub mod path;
pub mod schema;
pub mod sync;
pub mod tree;

pub use container::Container;
pub use error::{Result, StatsError};
pub use path::Path;
pub use schema::{NodeLevel, NodeSchema};
pub use sync::{RemoteStats, SyncBatch, SyncEntry, Version};
pub use tree::{StatsTree, TreeNode};
