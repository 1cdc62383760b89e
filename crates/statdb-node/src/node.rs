//! The satellite node: local delta buffer with versioning and durability.
//!
//! A node never reads from the master. `update` accumulates deltas in the
//! pending buffer, `get` exposes only that not-yet-synced local state, and
//! `sync` ships the buffer as one immutable batch. The buffer is cleared
//! only on confirmed success; any failure leaves it intact for the host to
//! retry on its own schedule.

use parking_lot::Mutex;
use statdb_core::{Container, NodeSchema, Path, Result, SyncBatch, SyncEntry};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::persist;
use crate::transport::StatsTransport;
use crate::version::VersionSource;

/// Local delta buffer replicating into a remote master.
pub struct StatsNode<V: Container, T: StatsTransport<V>> {
    schema: NodeSchema<V>,
    transport: T,
    versions: Arc<VersionSource>,
    /// Pending deltas: at most one outstanding entry per path, carrying
    /// the latest version stamped on it.
    pending: Mutex<HashMap<Path, SyncEntry<V>>>,
    /// Snapshot of the batch currently in flight. Kept until the outcome
    /// is known: folded back into `pending` on failure, discarded on
    /// success. Lock order is `pending` before `inflight`.
    inflight: Mutex<Vec<SyncEntry<V>>>,
    durable: Option<PathBuf>,
    last_sync_success: AtomicBool,
}

impl<V: Container, T: StatsTransport<V>> StatsNode<V, T> {
    /// Create a node with a fresh version source.
    ///
    /// If `durable` is set and a pending buffer was persisted there by a
    /// previous incarnation, it is reloaded; unsynced updates survive a
    /// restart.
    pub fn new(schema: NodeSchema<V>, transport: T, durable: Option<PathBuf>) -> Result<Self> {
        Self::with_versions(schema, transport, durable, Arc::new(VersionSource::default()))
    }

    /// Create a node sharing an externally owned version source.
    pub fn with_versions(
        schema: NodeSchema<V>,
        transport: T,
        durable: Option<PathBuf>,
        versions: Arc<VersionSource>,
    ) -> Result<Self> {
        let pending = match &durable {
            Some(file) => {
                let loaded = persist::load(file)?;
                if !loaded.is_empty() {
                    debug!(entries = loaded.len(), "reloaded pending buffer");
                    // New stamps must not fall behind reloaded ones.
                    if let Some(max) = loaded.values().map(|e| e.version).max() {
                        versions.advance_to(max);
                    }
                }
                loaded
            }
            None => HashMap::new(),
        };

        Ok(Self {
            schema,
            transport,
            versions,
            pending: Mutex::new(pending),
            inflight: Mutex::new(Vec::new()),
            durable,
            last_sync_success: AtomicBool::new(false),
        })
    }

    /// Record a local delta at `path`.
    ///
    /// The mutator is applied to a fresh schema default, and the result is
    /// merged into any delta already pending for the path, which is then
    /// restamped with the next version id. With a durability file
    /// configured, the whole call fails unless the buffer reaches disk.
    pub fn update<F>(&self, path: impl Into<Path>, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut V),
    {
        let path = path.into();
        self.schema.validate(&path)?;
        let mut delta = self.schema.default_for(path.len())?;
        mutator(&mut delta);

        let mut pending = self.pending.lock();
        let version = self.versions.next();
        match pending.entry(path.clone()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                existing.value.merge(&delta);
                existing.version = version;
            }
            Entry::Vacant(slot) => {
                slot.insert(SyncEntry {
                    path,
                    value: delta,
                    version,
                });
            }
        }
        self.store_durable(&pending)
    }

    /// Not-yet-synced local value at `path`.
    ///
    /// Reads only the pending buffer; master-side merged or aggregated
    /// state is never visible here.
    pub fn get(&self, path: impl Into<Path>) -> Option<V> {
        self.pending
            .lock()
            .get(&path.into())
            .map(|e| e.value.clone())
    }

    /// Outcome of the most recent `sync` call; `false` until one succeeds.
    pub fn last_sync_success(&self) -> bool {
        self.last_sync_success.load(Ordering::SeqCst)
    }

    /// Ship all pending deltas to the master as one batch.
    ///
    /// An empty buffer is a legal no-op. On success the snapshotted
    /// entries are gone for good; deltas recorded while the send was in
    /// flight stay pending for the next call. On failure the snapshot is
    /// merged back into the buffer and the call returns the transport
    /// error; the node never retries on its own.
    pub async fn sync(&self) -> Result<()> {
        let batch = {
            let mut pending = self.pending.lock();
            if pending.is_empty() {
                self.last_sync_success.store(true, Ordering::SeqCst);
                return Ok(());
            }
            let entries: Vec<SyncEntry<V>> = pending.drain().map(|(_, entry)| entry).collect();
            *self.inflight.lock() = entries.clone();
            SyncBatch::new(entries)
        };

        // The snapshot stays in `inflight` until the outcome is known, and
        // every durable rewrite includes it, so a crash at any point
        // replays the batch and the master's version guard absorbs it.
        let sent = batch.len();
        match self.transport.send(batch).await {
            Ok(()) => {
                self.inflight.lock().clear();
                debug!(entries = sent, "sync acknowledged");
                self.rewrite_durable();
                self.last_sync_success.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(err) => {
                warn!(%err, entries = sent, "sync failed, buffer retained");
                let mut pending = self.pending.lock();
                let snapshot: Vec<SyncEntry<V>> = self.inflight.lock().drain(..).collect();
                for entry in snapshot {
                    match pending.entry(entry.path.clone()) {
                        // A newer delta arrived mid-flight: fold the failed
                        // snapshot back in, keeping the newer stamp.
                        Entry::Occupied(mut slot) => {
                            slot.get_mut().value.merge(&entry.value);
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(entry);
                        }
                    }
                }
                drop(pending);
                self.rewrite_durable();
                self.last_sync_success.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Persist the pending buffer plus any in-flight snapshot.
    ///
    /// The union is what a replaying restart needs: unacknowledged
    /// entries keep their original stamps, so the master can tell a
    /// replay from a genuinely new delta.
    fn store_durable(&self, pending: &HashMap<Path, SyncEntry<V>>) -> Result<()> {
        if let Some(file) = &self.durable {
            let inflight = self.inflight.lock();
            persist::store(file, inflight.iter().chain(pending.values()).collect())?;
        }
        Ok(())
    }

    /// Bring the durability file in line with the current buffer.
    ///
    /// Failures are logged, not propagated: a stale file only replays
    /// already-acknowledged deltas, which the master discards.
    fn rewrite_durable(&self) {
        let pending = self.pending.lock();
        if let Err(err) = self.store_durable(&pending) {
            warn!(%err, "failed to rewrite pending buffer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use statdb_core::{NodeLevel, StatsError};

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Stat {
        n: i64,
    }

    impl Container for Stat {
        fn merge(&mut self, other: &Self) {
            self.n += other.n;
        }
        fn aggregate(&mut self, _children: &[&Self]) {}
    }

    fn schema2() -> NodeSchema<Stat> {
        NodeSchema::new(vec![
            NodeLevel::new("n1", Stat::default),
            NodeLevel::new("n2", Stat::default),
        ])
        .unwrap()
    }

    /// Transport double: records batches, optionally failing each send,
    /// with a hook that runs inside the next `send` call.
    #[derive(Default)]
    struct RecordingTransport {
        batches: Mutex<Vec<SyncBatch<Stat>>>,
        failing: AtomicBool,
        hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl RecordingTransport {
        fn fail(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn hook_next_send(&self, hook: impl FnOnce() + Send + 'static) {
            *self.hook.lock() = Some(Box::new(hook));
        }
    }

    #[async_trait]
    impl StatsTransport<Stat> for RecordingTransport {
        async fn send(&self, batch: SyncBatch<Stat>) -> Result<()> {
            if let Some(hook) = self.hook.lock().take() {
                hook();
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(StatsError::Transport("connection refused".into()));
            }
            self.batches.lock().push(batch);
            Ok(())
        }
    }

    fn make_node(
        transport: Arc<RecordingTransport>,
        durable: Option<PathBuf>,
    ) -> StatsNode<Stat, Arc<RecordingTransport>> {
        StatsNode::new(schema2(), transport, durable).unwrap()
    }

    #[test]
    fn test_update_merges_and_restamps() {
        let node = make_node(Arc::new(RecordingTransport::default()), None);
        node.update(["k1", "k2"], |c| c.n = 10).unwrap();
        node.update(["k1", "k2"], |c| c.n = 3).unwrap();

        assert_eq!(node.get(["k1", "k2"]).unwrap().n, 13);
        let pending = node.pending.lock();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&Path::from(["k1", "k2"])].version, 2);
    }

    #[test]
    fn test_update_rejects_bad_depth() {
        let node = make_node(Arc::new(RecordingTransport::default()), None);
        let err = node.update(["a", "b", "c"], |c| c.n = 1).unwrap_err();
        assert!(matches!(err, StatsError::InvalidPathDepth { .. }));
    }

    #[tokio::test]
    async fn test_empty_sync_is_noop_success() {
        let transport = Arc::new(RecordingTransport::default());
        let node = make_node(transport.clone(), None);

        assert!(!node.last_sync_success());
        node.sync().await.unwrap();
        assert!(node.last_sync_success());
        assert!(transport.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_sync_drains_buffer() {
        let transport = Arc::new(RecordingTransport::default());
        let node = make_node(transport.clone(), None);

        node.update(["k1", "k2"], |c| c.n = 10).unwrap();
        node.update(["k1"], |c| c.n = 20).unwrap();
        node.sync().await.unwrap();

        assert!(node.get(["k1", "k2"]).is_none());
        assert!(node.get(["k1"]).is_none());
        let batches = transport.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn test_failed_sync_retains_buffer() {
        let transport = Arc::new(RecordingTransport::default());
        let node = make_node(transport.clone(), None);
        transport.fail(true);

        node.update(["k1", "k2"], |c| c.n = 10).unwrap();
        let err = node.sync().await.unwrap_err();
        assert!(matches!(err, StatsError::Transport(_)));
        assert!(!node.last_sync_success());
        assert_eq!(node.get(["k1", "k2"]).unwrap().n, 10);
        assert!(transport.batches.lock().is_empty());

        transport.fail(false);
        node.sync().await.unwrap();
        assert!(node.last_sync_success());
        assert!(node.get(["k1", "k2"]).is_none());
        assert_eq!(transport.batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_durable_file_keeps_inflight_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pending.json");
        let crash_copy = dir.path().join("crash.json");

        let transport = Arc::new(RecordingTransport::default());
        let node = Arc::new(make_node(transport.clone(), Some(file.clone())));
        node.update(["k1", "k2"], |c| c.n = 10).unwrap();

        // Mid-flight update, then capture the durability file exactly as a
        // crash at that instant would leave it.
        {
            let node = Arc::clone(&node);
            let file = file.clone();
            let crash_copy = crash_copy.clone();
            transport.hook_next_send(move || {
                node.update(["k9"], |c| c.n = 1).unwrap();
                std::fs::copy(&file, &crash_copy).unwrap();
            });
        }
        node.sync().await.unwrap();

        // The mid-flight delta stayed pending; the acknowledged one drained.
        assert!(node.get(["k1", "k2"]).is_none());
        assert_eq!(node.get(["k9"]).unwrap().n, 1);

        // A restart from the captured file replays both the unacknowledged
        // snapshot and the mid-flight delta.
        let replay = make_node(Arc::new(RecordingTransport::default()), Some(crash_copy));
        assert_eq!(replay.get(["k1", "k2"]).unwrap().n, 10);
        assert_eq!(replay.get(["k9"]).unwrap().n, 1);
    }

    #[tokio::test]
    async fn test_pending_buffer_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pending.json");
        let transport = Arc::new(RecordingTransport::default());
        transport.fail(true);

        {
            let node = make_node(transport.clone(), Some(file.clone()));
            node.update(["k1", "k2"], |c| c.n = 10).unwrap();
            let _ = node.sync().await;
        }

        transport.fail(false);
        let node = make_node(transport.clone(), Some(file.clone()));
        assert_eq!(node.get(["k1", "k2"]).unwrap().n, 10);
        node.sync().await.unwrap();

        let batches = transport.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].entries[0].path, Path::from(["k1", "k2"]));
        drop(batches);

        // Acknowledged: nothing left to replay after another restart.
        let node = make_node(transport, Some(file));
        assert!(node.get(["k1", "k2"]).is_none());
    }

    #[tokio::test]
    async fn test_version_stamps_continue_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pending.json");
        let transport = Arc::new(RecordingTransport::default());

        {
            let node = make_node(transport.clone(), Some(file.clone()));
            node.update(["k1"], |c| c.n = 1).unwrap();
            node.update(["k1"], |c| c.n = 1).unwrap();
        }

        let node = make_node(transport, Some(file));
        node.update(["k2"], |c| c.n = 1).unwrap();

        let pending = node.pending.lock();
        assert_eq!(pending[&Path::from(["k1"])].version, 2);
        assert_eq!(pending[&Path::from(["k2"])].version, 3);
    }
}
