//! The append-only dataset table.
//!
//! A CSV file with a fixed header, one row per materialized album. Rows are
//! appended and flushed one at a time. On resume the file is cut back to the
//! length recorded in the checkpoint, which drops rows written by a unit that
//! never committed.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use coverset_core::DatasetRecord;

use crate::error::StorageError;

/// File name of the table inside the output directory.
pub const TABLE_FILE: &str = "dataset.csv";

pub struct DatasetTable {
    path: PathBuf,
    writer: csv::Writer<File>,
    bytes: u64,
}

impl DatasetTable {
    /// Create (or truncate) the table and write the header row.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let file = File::create(&path).map_err(|e| StorageError::io(&path, e))?;
        let mut table = Self {
            writer: Self::writer(file),
            path,
            bytes: 0,
        };
        table.writer.write_record(DatasetRecord::COLUMNS)?;
        table.sync_len()?;
        Ok(table)
    }

    /// Reopen an existing table for appending, truncated to `committed_bytes`.
    ///
    /// A table shorter than the committed length means rows the checkpoint
    /// counts on are gone; that is reported instead of silently continuing.
    pub fn open_at(path: impl Into<PathBuf>, committed_bytes: u64) -> Result<Self, StorageError> {
        let path = path.into();
        let actual = fs::metadata(&path)
            .map_err(|e| StorageError::io(&path, e))?
            .len();
        if actual < committed_bytes {
            return Err(StorageError::TableTooShort {
                path,
                expected: committed_bytes,
                actual,
            });
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;
        if actual > committed_bytes {
            log::info!(
                "Discarding {} uncommitted bytes from {}",
                actual - committed_bytes,
                path.display()
            );
            file.set_len(committed_bytes)
                .map_err(|e| StorageError::io(&path, e))?;
        }

        Ok(Self {
            writer: Self::writer(file),
            path,
            bytes: committed_bytes,
        })
    }

    /// Append one row and flush it to the file.
    pub fn append(&mut self, record: &DatasetRecord) -> Result<(), StorageError> {
        self.writer.serialize(record)?;
        self.sync_len()
    }

    /// Current byte length of the table, as flushed.
    pub fn len_bytes(&self) -> u64 {
        self.bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(file: File) -> csv::Writer<File> {
        csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file)
    }

    fn sync_len(&mut self) -> Result<(), StorageError> {
        self.writer
            .flush()
            .map_err(|e| StorageError::io(&self.path, e))?;
        self.bytes = self
            .writer
            .get_ref()
            .metadata()
            .map_err(|e| StorageError::io(&self.path, e))?
            .len();
        Ok(())
    }
}

/// Read every row of a table.
pub fn read_records(path: &Path) -> Result<Vec<DatasetRecord>, StorageError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<DatasetRecord>, _>>()?;
    Ok(records)
}

/// True if a table exists at `path` and holds anything beyond its header.
pub fn has_rows(path: &Path) -> bool {
    csv::Reader::from_path(path)
        .map(|mut r| r.records().next().is_some())
        .unwrap_or(false)
}
