//! Storage port for the master's canonical tree.
//!
//! Any durable backend satisfying this contract is interchangeable. The
//! master does not consider a batch durably applied until `save` returns;
//! a no-op implementation is valid for ephemeral trees.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use statdb_core::{Container, Path, Result, StatsError, Version};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// One persisted row: a node's path, its container value, and the
/// last-applied remote version for that path (if any).
///
/// Derived (aggregate) fields are recomputed on load and never trusted
/// from storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredNode<V> {
    pub path: Path,
    pub value: V,
    pub version: Option<Version>,
}

/// Persistence abstraction consumed by the master.
pub trait StatsStorage<V: Container>: Send + Sync {
    /// Every persisted row. An empty result is a valid fresh tree.
    fn load_all(&self) -> Result<Vec<StoredNode<V>>>;

    /// Upsert the given rows; durable before this returns.
    fn save(&self, rows: &[StoredNode<V>]) -> Result<()>;

    /// Remove one row. Reserved for retention/expiry.
    fn delete(&self, path: &Path) -> Result<()>;
}

/// No-op storage for ephemeral trees: never persisted, lost on exit.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStorage;

impl<V: Container> StatsStorage<V> for NullStorage {
    fn load_all(&self) -> Result<Vec<StoredNode<V>>> {
        Ok(Vec::new())
    }

    fn save(&self, _rows: &[StoredNode<V>]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Shared in-memory storage.
///
/// Clones share the same backing map, so a master can be torn down and
/// reconstructed over the same rows.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage<V> {
    rows: Arc<Mutex<HashMap<Path, StoredNode<V>>>>,
}

impl<V: Container> MemoryStorage<V> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl<V: Container> StatsStorage<V> for MemoryStorage<V> {
    fn load_all(&self) -> Result<Vec<StoredNode<V>>> {
        Ok(self.rows.lock().values().cloned().collect())
    }

    fn save(&self, rows: &[StoredNode<V>]) -> Result<()> {
        let mut map = self.rows.lock();
        for row in rows {
            map.insert(row.path.clone(), row.clone());
        }
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        self.rows.lock().remove(path);
        Ok(())
    }
}

/// File-backed storage: all rows as one JSON document, flushed through a
/// temp file and an atomic rename on every save.
#[derive(Debug)]
pub struct FileStorage<V> {
    file: PathBuf,
    cache: Mutex<HashMap<Path, StoredNode<V>>>,
}

impl<V: Container> FileStorage<V> {
    pub fn open(file: impl Into<PathBuf>) -> Result<Self> {
        let file = file.into();
        let cache = if file.exists() {
            let bytes = fs::read(&file).map_err(|e| StatsError::Storage(e.to_string()))?;
            let rows: Vec<StoredNode<V>> = serde_json::from_slice(&bytes)?;
            rows.into_iter().map(|r| (r.path.clone(), r)).collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            file,
            cache: Mutex::new(cache),
        })
    }

    fn flush(&self, cache: &HashMap<Path, StoredNode<V>>) -> Result<()> {
        let mut rows: Vec<&StoredNode<V>> = cache.values().collect();
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        let json = serde_json::to_vec_pretty(&rows)?;

        let tmp = self.file.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| StatsError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.file).map_err(|e| StatsError::Storage(e.to_string()))
    }
}

impl<V: Container> StatsStorage<V> for FileStorage<V> {
    fn load_all(&self) -> Result<Vec<StoredNode<V>>> {
        Ok(self.cache.lock().values().cloned().collect())
    }

    fn save(&self, rows: &[StoredNode<V>]) -> Result<()> {
        let mut cache = self.cache.lock();
        for row in rows {
            cache.insert(row.path.clone(), row.clone());
        }
        self.flush(&cache)
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut cache = self.cache.lock();
        cache.remove(path);
        self.flush(&cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn row(keys: &[&str], n: i64, version: Option<Version>) -> StoredNode<Stat> {
        StoredNode {
            path: Path::from(keys),
            value: Stat { n },
            version,
        }
    }

    #[test]
    fn test_null_storage_is_empty() {
        let storage = NullStorage;
        StatsStorage::<Stat>::save(&storage, &[row(&["a"], 1, None)]).unwrap();
        assert!(StatsStorage::<Stat>::load_all(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_memory_storage_shared_across_clones() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.save(&[row(&["a"], 1, Some(3))]).unwrap();

        let rows = other.load_all().unwrap();
        assert_eq!(rows, vec![row(&["a"], 1, Some(3))]);
    }

    #[test]
    fn test_memory_storage_upserts() {
        let storage = MemoryStorage::new();
        storage.save(&[row(&["a"], 1, None)]).unwrap();
        storage.save(&[row(&["a"], 5, Some(2)), row(&["b"], 7, None)]).unwrap();

        let mut rows = storage.load_all().unwrap();
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(rows, vec![row(&["a"], 5, Some(2)), row(&["b"], 7, None)]);
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stats.json");

        let storage: FileStorage<Stat> = FileStorage::open(&file).unwrap();
        storage
            .save(&[row(&["k1"], 10, Some(1)), row(&["k1", "k2"], 3, None)])
            .unwrap();
        drop(storage);

        let reopened: FileStorage<Stat> = FileStorage::open(&file).unwrap();
        let mut rows = reopened.load_all().unwrap();
        rows.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(rows, vec![row(&["k1"], 10, Some(1)), row(&["k1", "k2"], 3, None)]);
    }

    #[test]
    fn test_file_storage_delete() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stats.json");

        let storage: FileStorage<Stat> = FileStorage::open(&file).unwrap();
        storage.save(&[row(&["a"], 1, None), row(&["b"], 2, None)]).unwrap();
        storage.delete(&Path::from(["a"])).unwrap();
        drop(storage);

        let reopened: FileStorage<Stat> = FileStorage::open(&file).unwrap();
        assert_eq!(reopened.load_all().unwrap(), vec![row(&["b"], 2, None)]);
    }
}
