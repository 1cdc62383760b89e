//! statdb - hierarchical statistics tree with master/node delta sync.
//!
//! Satellite nodes accumulate local deltas keyed by path and periodically
//! replicate them to one authoritative master, which merges them
//! idempotently, recomputes aggregates bottom-up, and persists the
//! canonical tree.
//!
//! This crate is a facade over the workspace members:
//!
//! - [`statdb_core`] - path, schema, container contract, tree, batch types
//! - [`statdb_master`] - the authoritative tree and its storage port
//! - [`statdb_node`] - the satellite delta buffer and its transport port
//!
//! # Quick Start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use statdb::{
//!     Container, DirectTransport, NodeLevel, NodeSchema, NullStorage, StatsMaster, StatsNode,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Hits {
//!     count: i64,
//!     rolled_up: i64,
//! }
//!
//! impl Container for Hits {
//!     fn merge(&mut self, other: &Self) {
//!         self.count += other.count;
//!     }
//!     fn aggregate(&mut self, children: &[&Self]) {
//!         self.rolled_up = children.iter().map(|c| c.count + c.rolled_up).sum();
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> statdb::Result<()> {
//! let schema = NodeSchema::new(vec![
//!     NodeLevel::new("campaign", Hits::default),
//!     NodeLevel::new("creative", Hits::default),
//! ])?;
//!
//! let master = Arc::new(StatsMaster::new(schema.clone(), NullStorage)?);
//! let node = StatsNode::new(schema, DirectTransport::new(master.clone()), None)?;
//!
//! node.update(["summer", "banner"], |h| h.count += 1)?;
//! node.sync().await?;
//!
//! assert_eq!(master.get(["summer"]).unwrap().rolled_up, 1);
//! # Ok(())
//! # }
//! ```

pub use statdb_core::{
    Container, NodeLevel, NodeSchema, Path, RemoteStats, Result, StatsError, StatsTree,
    SyncBatch, SyncEntry, TreeNode, Version,
};
pub use statdb_master::{
    FileStorage, MemoryStorage, NullStorage, StatsMaster, StatsStorage, StoredNode,
};
pub use statdb_node::{DirectTransport, StatsNode, StatsTransport, VersionSource};
