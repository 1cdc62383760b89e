//! Transport port from a node to the master.
//!
//! The contract is all-or-nothing: `send` either fully succeeds (the batch
//! is considered applied) or fully fails (considered not applied) from the
//! node's point of view. There is no partial acknowledgement of individual
//! paths within one batch, and no mid-flight cancellation.

use async_trait::async_trait;
use statdb_core::{Container, RemoteStats, Result, SyncBatch};
use std::sync::Arc;

/// Abstract call from node to master.
#[async_trait]
pub trait StatsTransport<V: Container>: Send + Sync {
    async fn send(&self, batch: SyncBatch<V>) -> Result<()>;
}

/// In-process transport: calls the master's sync entry point directly.
pub struct DirectTransport<R: ?Sized> {
    remote: Arc<R>,
}

impl<R: ?Sized> DirectTransport<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl<V, R> StatsTransport<V> for DirectTransport<R>
where
    V: Container,
    R: RemoteStats<V> + ?Sized,
{
    async fn send(&self, batch: SyncBatch<V>) -> Result<()> {
        self.remote.sync(batch).await
    }
}

#[async_trait]
impl<V, T> StatsTransport<V> for Arc<T>
where
    V: Container,
    T: StatsTransport<V> + ?Sized,
{
    async fn send(&self, batch: SyncBatch<V>) -> Result<()> {
        (**self).send(batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use statdb_core::Path;

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

    #[derive(Default)]
    struct RecordingRemote {
        batches: Mutex<Vec<SyncBatch<Stat>>>,
    }

    #[async_trait]
    impl RemoteStats<Stat> for RecordingRemote {
        async fn sync(&self, batch: SyncBatch<Stat>) -> Result<()> {
            self.batches.lock().push(batch);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_direct_transport_forwards_batch() {
        let remote = Arc::new(RecordingRemote::default());
        let transport = DirectTransport::new(remote.clone());

        let batch = SyncBatch::new(vec![statdb_core::SyncEntry {
            path: Path::from(["k1"]),
            value: Stat { n: 4 },
            version: 1,
        }]);
        transport.send(batch.clone()).await.unwrap();

        assert_eq!(remote.batches.lock().as_slice(), &[batch]);
    }
}
