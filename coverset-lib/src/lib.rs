//! Durable storage for a coverset crawl: checkpoint snapshots, the dataset
//! table, the cover asset layout and shared settings.

pub mod async_util;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod fs;
pub mod genres;
pub mod layout;
pub mod settings;

pub use checkpoint::{CHECKPOINT_VERSION, CheckpointStore, ProgressSummary, RunCheckpoint};
pub use dataset::DatasetTable;
pub use error::{SettingsError, StorageError};
pub use genres::{load_genres, parse_genres};
pub use layout::AssetLayout;
pub use settings::CrawlSettings;
