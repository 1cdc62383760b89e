//! Sync batch types and the remote master port.
//!
//! A batch is an immutable snapshot of a node's pending deltas, each entry
//! stamped with a per-node monotonic version. The master uses the version
//! purely as an idempotency guard: re-applying an already-seen
//! `(path, version)` pair is a no-op, so at-least-once delivery never
//! double-counts.

use crate::container::Container;
use crate::error::Result;
use crate::path::Path;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Monotonic per-node version id stamped on every delta.
pub type Version = u64;

/// One pending delta: the merged local mutations at a path plus the latest
/// version assigned to them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncEntry<V> {
    pub path: Path,
    pub value: V,
    pub version: Version,
}

/// Immutable snapshot of a node's pending deltas, sent in one sync call.
///
/// Ordering across distinct paths carries no meaning; the master
/// version-checks each path independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch<V> {
    pub entries: Vec<SyncEntry<V>>,
}

impl<V> SyncBatch<V> {
    pub fn new(entries: Vec<SyncEntry<V>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The master's remote entry point.
///
/// The call either fully succeeds (batch considered applied) or fully
/// fails (batch considered not applied) from the node's point of view;
/// there is no partial acknowledgement of individual paths.
#[async_trait]
pub trait RemoteStats<V: Container>: Send + Sync {
    async fn sync(&self, batch: SyncBatch<V>) -> Result<()>;
}
