use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Album;

/// An album whose cover download failed, parked for the next run.
///
/// The album is already in the ledger; retrying only needs the stored URLs,
/// never another metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAssetRetry {
    pub album: Album,
    /// Number of runs whose download attempt failed.
    pub attempts: u32,
    pub last_error: String,
}

/// What kind of entity a skip refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Genre,
    Artist,
    Album,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Genre => write!(f, "genre"),
            EntityKind::Artist => write!(f, "artist"),
            EntityKind::Album => write!(f, "album"),
        }
    }
}

/// An entity dropped after a permanent failure. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    pub kind: EntityKind,
    pub id: String,
    pub reason: String,
}

impl SkippedEntity {
    pub fn new(kind: EntityKind, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SkippedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.id, self.reason)
    }
}
