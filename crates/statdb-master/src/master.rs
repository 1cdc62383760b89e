//! The authoritative stats tree.
//!
//! The master serializes all mutation through one lock: direct local
//! updates and incoming sync batches both take it, so readers always
//! observe a fully merged and aggregated snapshot, never a partially
//! applied batch.
//!
//! Idempotency: each path carries the last-applied remote version. A batch
//! entry whose version is not strictly greater is a stale or duplicate
//! replay and is discarded, which makes at-least-once delivery from the
//! nodes safe to retry.

use async_trait::async_trait;
use parking_lot::Mutex;
use statdb_core::{
    Container, NodeSchema, Path, RemoteStats, Result, StatsError, StatsTree, SyncBatch, Version,
};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, warn};

use crate::storage::{StatsStorage, StoredNode};

struct Inner<V: Container> {
    tree: StatsTree<V>,
    /// Last-applied remote version per path. Never discarded once seen.
    versions: HashMap<Path, Version>,
    /// Paths merged in memory whose last persist attempt failed. Retried
    /// on the next persisting call, so a durably skipped replay still
    /// lands the earlier rows on disk.
    unpersisted: BTreeSet<Path>,
}

/// Owner of the canonical tree.
pub struct StatsMaster<V: Container, S: StatsStorage<V>> {
    inner: Mutex<Inner<V>>,
    storage: S,
}

impl<V: Container, S: StatsStorage<V>> StatsMaster<V, S> {
    /// Rebuild the tree from storage and recompute every aggregate.
    ///
    /// An empty storage is a valid fresh tree.
    pub fn new(schema: NodeSchema<V>, storage: S) -> Result<Self> {
        let mut tree = StatsTree::new(schema);
        let mut versions = HashMap::new();
        for row in storage.load_all()? {
            if let Err(err) = tree.schema().validate(&row.path) {
                warn!(path = %row.path, %err, "discarding stored row outside schema");
                continue;
            }
            *tree.get_or_create(&row.path)? = row.value;
            if let Some(version) = row.version {
                versions.insert(row.path, version);
            }
        }
        tree.recompute_all();

        Ok(Self {
            inner: Mutex::new(Inner {
                tree,
                versions,
                unpersisted: BTreeSet::new(),
            }),
            storage,
        })
    }

    /// Apply a mutation directly to the value at `path`, creating the node
    /// and missing ancestors from schema defaults.
    ///
    /// This is the local, unversioned entry point for in-process callers;
    /// unlike [`sync`](Self::sync) it always applies.
    pub fn update<F>(&self, path: impl Into<Path>, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut V),
    {
        let path = path.into();
        let mut inner = self.inner.lock();
        mutator(inner.tree.get_or_create(&path)?);
        let touched = inner.tree.recompute([path]);
        self.persist(&mut inner, touched)
    }

    /// Apply one versioned batch from a satellite node.
    ///
    /// Entries are merged per path under the version guard; aggregates are
    /// recomputed bottom-up once the whole batch has been merged. A
    /// persistence failure fails the batch as a whole - the in-memory
    /// merges stay, and the node's retry is absorbed by the version guard.
    pub fn sync(&self, batch: SyncBatch<V>) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut dirty = Vec::new();
        for entry in batch.entries {
            if let Err(err) = inner.tree.schema().validate(&entry.path) {
                // One malformed entry must not poison the whole batch.
                error!(path = %entry.path, %err, "skipping sync entry outside schema");
                continue;
            }
            if let Some(&applied) = inner.versions.get(&entry.path) {
                if entry.version <= applied {
                    debug!(
                        path = %entry.path,
                        version = entry.version,
                        applied,
                        "discarding stale sync entry"
                    );
                    continue;
                }
            }
            inner.tree.get_or_create(&entry.path)?.merge(&entry.value);
            inner.versions.insert(entry.path.clone(), entry.version);
            dirty.push(entry.path);
        }

        let touched = if dirty.is_empty() {
            if inner.unpersisted.is_empty() {
                return Ok(());
            }
            // Nothing new, but an earlier persist failed: retry it even
            // for an all-stale replay.
            BTreeSet::new()
        } else {
            debug!(entries = dirty.len(), "applied sync batch");
            inner.tree.recompute(dirty)
        };
        self.persist(&mut inner, touched)
            .map_err(|e| StatsError::Apply(e.to_string()))
    }

    /// Current merged and aggregated value at `path`.
    pub fn get(&self, path: impl Into<Path>) -> Option<V> {
        self.inner.lock().tree.get(&path.into()).cloned()
    }

    /// Direct child values of the node at `path`; empty for unknown paths
    /// and for nodes without children.
    pub fn children(&self, path: impl Into<Path>) -> Vec<V> {
        self.inner
            .lock()
            .tree
            .children(&path.into())
            .into_iter()
            .cloned()
            .collect()
    }

    /// Write every touched row, plus any rows whose last persist failed.
    ///
    /// On failure the whole set is kept for the next attempt; the
    /// in-memory merges themselves are never rolled back.
    fn persist(&self, inner: &mut Inner<V>, touched: BTreeSet<Path>) -> Result<()> {
        inner.unpersisted.extend(touched);
        let mut rows = Vec::new();
        for path in &inner.unpersisted {
            if let Some(value) = inner.tree.get(path) {
                rows.push(StoredNode {
                    path: path.clone(),
                    value: value.clone(),
                    version: inner.versions.get(path).copied(),
                });
            }
        }
        self.storage.save(&rows)?;
        inner.unpersisted.clear();
        Ok(())
    }
}

#[async_trait]
impl<V: Container, S: StatsStorage<V>> RemoteStats<V> for StatsMaster<V, S> {
    async fn sync(&self, batch: SyncBatch<V>) -> Result<()> {
        StatsMaster::sync(self, batch)
    }
}
