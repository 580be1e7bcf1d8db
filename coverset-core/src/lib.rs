//! Core types for the coverset crawl pipeline.
//!
//! Everything here is pure and synchronous: the catalog data model, the
//! identity/deduplication ledger and the traversal frontier. Persistence
//! lives in `coverset-lib`, network access in `coverset-scraper`.

pub mod error;
pub mod frontier;
pub mod ids;
pub mod ledger;
pub mod model;
pub mod retry;

pub use error::IdError;
pub use frontier::{Frontier, FrontierCounts, WorkUnit};
pub use ids::validate_path_component;
pub use ledger::{AlbumEntry, Ledger, Recorded};
pub use model::{Album, AlbumSummary, Artist, CoverSize, CoverUrls, DatasetRecord};
pub use retry::{EntityKind, PendingAssetRetry, SkippedEntity};
