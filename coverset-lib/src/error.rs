use std::path::PathBuf;

use thiserror::Error;

/// Failures writing or reading durable crawl state.
///
/// Any of these ends the run: once a write has failed the checkpoint can no
/// longer vouch for what is on disk.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dataset table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("checkpoint version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("dataset table {} is {actual} bytes but the checkpoint recorded {expected}", path.display())]
    TableTooShort {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("invalid asset id: {0}")]
    InvalidId(#[from] coverset_core::IdError),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures loading `settings.toml`.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
