//! Local durability for the pending-delta buffer.
//!
//! The buffer round-trips as a JSON list of sync entries. Writes go
//! through a temp file and an atomic rename, so a crash never leaves a
//! half-written buffer behind. While a sync is in flight the list may
//! carry two entries for the same path, the unacknowledged snapshot and a
//! newer delta; `load` folds such pairs back into one pending entry.

use statdb_core::{Container, Path, Result, StatsError, SyncEntry};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::Path as FsPath;

/// Load a previously persisted pending buffer. A missing file is an empty
/// buffer.
pub(crate) fn load<V: Container>(file: &FsPath) -> Result<HashMap<Path, SyncEntry<V>>> {
    if !file.exists() {
        return Ok(HashMap::new());
    }
    let bytes = fs::read(file).map_err(|e| StatsError::Storage(e.to_string()))?;
    let entries: Vec<SyncEntry<V>> = serde_json::from_slice(&bytes)?;

    let mut buffer: HashMap<Path, SyncEntry<V>> = HashMap::new();
    for entry in entries {
        match buffer.entry(entry.path.clone()) {
            // A snapshot was in flight when this file was written: fold it
            // into the newer delta, keeping the newest stamp.
            Entry::Occupied(mut slot) => {
                let pending = slot.get_mut();
                pending.value.merge(&entry.value);
                pending.version = pending.version.max(entry.version);
            }
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
    }
    Ok(buffer)
}

/// Persist the given entries, replacing any previous contents.
pub(crate) fn store<V: Container>(file: &FsPath, mut entries: Vec<&SyncEntry<V>>) -> Result<()> {
    entries.sort_by(|a, b| a.path.cmp(&b.path).then(a.version.cmp(&b.version)));
    let json = serde_json::to_vec(&entries)?;

    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StatsError::Storage(e.to_string()))?;
        }
    }
    let tmp = file.with_extension("tmp");
    fs::write(&tmp, json).map_err(|e| StatsError::Storage(e.to_string()))?;
    fs::rename(&tmp, file).map_err(|e| StatsError::Storage(e.to_string()))
}
