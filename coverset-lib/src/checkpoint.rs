//! Versioned run checkpoints with atomic replace-on-write.
//!
//! A checkpoint is the whole resumable state of a crawl: ledger, frontier,
//! parked asset retries, skipped entities and progress counters. It is
//! rewritten in full after every work unit and read once at startup. There is
//! a single writer, so the atomic rename is the only coordination needed.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use coverset_core::{Frontier, Ledger, PendingAssetRetry, SkippedEntity};

use crate::error::StorageError;
use crate::fs::atomic_write;

/// Snapshot format version. Older or newer snapshots are refused rather than
/// guessed at.
pub const CHECKPOINT_VERSION: u32 = 1;

/// File name of the checkpoint inside the output directory.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub version: u32,
    pub ledger: Ledger,
    pub frontier: Frontier,
    /// Rows in the dataset table, header excluded.
    pub records_written: u64,
    /// Work units completed across all runs; the index of the next unit.
    pub units_completed: u64,
    /// Byte length of the dataset table when this checkpoint was committed.
    pub table_bytes: u64,
    #[serde(default)]
    pub asset_retries: Vec<PendingAssetRetry>,
    #[serde(default)]
    pub skipped: Vec<SkippedEntity>,
}

impl RunCheckpoint {
    /// State for a crawl that has not started: every genre queued for seeding.
    pub fn fresh<I, S>(genres: I, table_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version: CHECKPOINT_VERSION,
            ledger: Ledger::new(),
            frontier: Frontier::from_genres(genres),
            records_written: 0,
            units_completed: 0,
            table_bytes,
            asset_retries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            artists: self.ledger.artist_count(),
            albums: self.ledger.album_count(),
            materialized: self.ledger.materialized_count(),
            records_written: self.records_written,
            units_completed: self.units_completed,
            frontier: self.frontier.len(),
            pending_retries: self.asset_retries.len(),
            skipped: self.skipped.len(),
        }
    }
}

/// Counts reported at checkpoint intervals and at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub artists: usize,
    pub albums: usize,
    pub materialized: usize,
    pub records_written: u64,
    pub units_completed: u64,
    pub frontier: usize,
    pub pending_retries: usize,
    pub skipped: usize,
}

impl fmt::Display for ProgressSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} units done, {} queued | artists: {}, albums: {} ({} materialized), rows: {}, retries pending: {}, skipped: {}",
            self.units_completed,
            self.frontier,
            self.artists,
            self.albums,
            self.materialized,
            self.records_written,
            self.pending_retries,
            self.skipped,
        )
    }
}

/// Reads and writes the checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `{output_dir}/checkpoint.json`.
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(CHECKPOINT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the last committed checkpoint, or `None` if there is none yet.
    pub fn load(&self) -> Result<Option<RunCheckpoint>, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        #[derive(Deserialize)]
        struct VersionProbe {
            version: u32,
        }
        let probe: VersionProbe = serde_json::from_slice(&bytes)?;
        if probe.version != CHECKPOINT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: probe.version,
                expected: CHECKPOINT_VERSION,
            });
        }

        let checkpoint: RunCheckpoint = serde_json::from_slice(&bytes)?;
        log::debug!(
            "Loaded checkpoint {} ({} units completed)",
            self.path.display(),
            checkpoint.units_completed
        );
        Ok(Some(checkpoint))
    }

    /// Atomically replace the checkpoint on disk.
    pub fn save(&self, checkpoint: &RunCheckpoint) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(checkpoint)?;
        atomic_write(&self.path, &bytes)
    }

    /// Delete the checkpoint. Missing files are not an error.
    pub fn remove(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }
}
