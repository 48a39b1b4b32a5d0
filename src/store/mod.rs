// Stats store module.
// In-memory TTL cache over the stats endpoint, with pluggable persistence.

pub mod snapshot;
pub mod stats;

pub use snapshot::{FileSnapshotStore, SNAPSHOT_KEY, Snapshot, SnapshotStore};
pub use stats::{DEFAULT_TTL, StatsMap, StatsSource, StatsStore};
