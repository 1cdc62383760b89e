//! statdb-node - the satellite side of the stats store.
//!
//! A node accumulates local deltas in a pending buffer, stamps each with a
//! monotonic version, optionally persists the buffer to disk so unsent
//! updates survive a crash, and ships the buffer to the master as one
//! batch through the [`transport::StatsTransport`] port. The buffer is
//! cleared only on confirmed success; a failed send leaves it intact for
//! the next attempt.

pub mod node;
mod persist;
pub mod transport;
pub mod version;

pub use node::StatsNode;
pub use transport::{DirectTransport, StatsTransport};
pub use version::VersionSource;
