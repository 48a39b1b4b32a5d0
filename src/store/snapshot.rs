// Snapshot persistence for the stats store.
// Saves the payload and fetch timestamp so a fresh process can rehydrate.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::stats::StatsMap;

/// Storage key for the persisted stats snapshot.
pub const SNAPSHOT_KEY: &str = "anime-stats";

/// The persisted subset of store state: payload and fetch timestamp.
/// Nothing else survives a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The last successfully fetched stats payload.
    pub stats: StatsMap,
    /// When the payload was fetched, if ever.
    pub last_fetched: Option<DateTime<Utc>>,
}

/// Persistence collaborator for the stats store. Implementations own
/// the storage medium; the store only sees load, save, and clear.
pub trait SnapshotStore {
    /// Load the persisted snapshot, `None` if nothing was saved.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Persist a snapshot, replacing any previous one.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Remove the persisted snapshot. Idempotent.
    fn clear(&self) -> Result<()>;
}

/// Snapshot store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store writing to the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default snapshot location under the platform cache directory
    /// (~/.cache/anidex on Linux).
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "anidex")
            .map(|dirs| dirs.cache_dir().join(format!("{}.json", SNAPSHOT_KEY)))
    }

    /// The file path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
