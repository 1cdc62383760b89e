//! Monotonic version id source.
//!
//! Each delta is stamped with the next id at every `update`, so a path's
//! pending delta always carries the latest id assigned to it. Ids order
//! nothing across paths; the master uses them purely to recognize
//! duplicate or stale replays.

use statdb_core::Version;
use std::sync::atomic::{AtomicU64, Ordering};

/// Strictly increasing counter, explicitly constructible and resettable.
///
/// `reset` exists for operators and tests that replay from a known point:
/// ids issued after a reset may collide with already-applied ids, which is
/// exactly what lets the master discard the replay.
#[derive(Debug, Default)]
pub struct VersionSource {
    counter: AtomicU64,
}

impl VersionSource {
    pub fn new(start: Version) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Next version id, strictly greater than any issued since the last
    /// reset.
    pub fn next(&self) -> Version {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Restart the sequence at `start`.
    pub fn reset(&self, start: Version) {
        self.counter.store(start, Ordering::SeqCst);
    }

    /// Ensure subsequently issued ids are greater than `floor`.
    ///
    /// Used when a persisted pending buffer is reloaded: new stamps must
    /// not fall behind the versions already assigned before the restart.
    pub fn advance_to(&self, floor: Version) {
        self.counter.fetch_max(floor, Ordering::SeqCst);
    }
}
