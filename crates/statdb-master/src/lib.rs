//! statdb-master - the authoritative side of the stats store.
//!
//! The master owns the canonical tree: it applies direct local updates,
//! merges versioned sync batches from satellite nodes idempotently,
//! recomputes aggregates bottom-up, and persists touched rows through the
//! [`storage::StatsStorage`] port.

pub mod master;
pub mod storage;

pub use master::StatsMaster;
pub use storage::{FileStorage, MemoryStorage, NullStorage, StatsStorage, StoredNode};
