//! Catalog entities and the dataset row they materialize into.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A music artist as known to the ledger.
///
/// `genres` holds provenance tags: the genres this artist was seeded under.
/// It only ever grows. `catalog_genres` is whatever the catalog itself reports
/// for the artist and is kept from the first sighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub catalog_genres: Vec<String>,
}

impl Artist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            genres: BTreeSet::new(),
            catalog_genres: Vec::new(),
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genres.insert(genre.into());
        self
    }

    pub fn with_catalog_genres(mut self, genres: Vec<String>) -> Self {
        self.catalog_genres = genres;
        self
    }

    /// Value for the dataset `genre` column.
    ///
    /// Provenance genres joined with `;`. Artists reached only through the
    /// related-artist relation have none, so the catalog's own tags are used.
    pub fn genre_label(&self) -> String {
        if self.genres.is_empty() {
            self.catalog_genres.join(";")
        } else {
            self.genres.iter().map(String::as_str).collect::<Vec<_>>().join(";")
        }
    }
}

/// An album as listed by the catalog, before cover art is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: String,
}

/// Cover image URLs for an album. Either size may be missing upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverUrls {
    pub large: Option<String>,
    pub small: Option<String>,
}

impl CoverUrls {
    pub fn new(large: impl Into<String>, small: impl Into<String>) -> Self {
        Self {
            large: Some(large.into()),
            small: Some(small.into()),
        }
    }

    /// Both URLs, if both are present.
    pub fn both(&self) -> Option<(&str, &str)> {
        match (&self.large, &self.small) {
            (Some(l), Some(s)) => Some((l.as_str(), s.as_str())),
            _ => None,
        }
    }
}

/// A fully described album, owned by the artist whose album list produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub artist_id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: String,
    pub cover_url_large: String,
    pub cover_url_small: String,
}

impl Album {
    pub fn from_summary(
        summary: AlbumSummary,
        artist_id: impl Into<String>,
        cover_url_large: impl Into<String>,
        cover_url_small: impl Into<String>,
    ) -> Self {
        Self {
            id: summary.id,
            artist_id: artist_id.into(),
            name: summary.name,
            release_date: summary.release_date,
            cover_url_large: cover_url_large.into(),
            cover_url_small: cover_url_small.into(),
        }
    }

    /// Release year parsed from the leading digits of `release_date`.
    ///
    /// The catalog reports dates at year, month or day precision
    /// (`1986`, `1986-03`, `1986-03-03`).
    pub fn release_year(&self) -> Option<u16> {
        self.release_date.get(..4)?.parse().ok()
    }

    pub fn cover_url(&self, size: CoverSize) -> &str {
        match size {
            CoverSize::Large => &self.cover_url_large,
            CoverSize::Small => &self.cover_url_small,
        }
    }
}

/// The two cover renditions kept per album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverSize {
    Large,
    Small,
}

impl CoverSize {
    pub const ALL: [CoverSize; 2] = [CoverSize::Large, CoverSize::Small];

    /// Edge length in pixels of the catalog rendition.
    pub fn pixels(self) -> u32 {
        match self {
            CoverSize::Large => 300,
            CoverSize::Small => 64,
        }
    }
}

impl fmt::Display for CoverSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.pixels())
    }
}

/// One row of the output table. Written exactly once per materialized album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub genre: String,
    pub artist: String,
    pub album: String,
    pub release_date: String,
    pub cover_path_large: String,
    pub cover_path_small: String,
}

impl DatasetRecord {
    pub const COLUMNS: [&'static str; 6] = [
        "genre",
        "artist",
        "album",
        "release_date",
        "cover_path_large",
        "cover_path_small",
    ];
}
