//! Spotify Web API response shapes. Only the fields the crawl reads are
//! modelled.

use serde::Deserialize;

use coverset_core::{AlbumSummary, Artist, CoverSize, CoverUrls};

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Error body returned by the Web API on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub message: String,
}

/// A page of results. `next` is the absolute URL of the following page.
#[derive(Debug, Deserialize)]
pub struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistSearchResponse {
    pub artists: Paging<ArtistObject>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedArtistsResponse {
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl From<ArtistObject> for Artist {
    fn from(a: ArtistObject) -> Self {
        Artist::new(a.id, a.name).with_catalog_genres(a.genres)
    }
}

/// Album as it appears in an artist's album list and from `/albums/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

impl AlbumObject {
    pub fn summary(&self) -> AlbumSummary {
        AlbumSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            release_date: self.release_date.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageObject {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

impl ImageObject {
    fn edge(&self) -> Option<u32> {
        self.height.or(self.width)
    }
}

/// Pick the large and small renditions from an album's image list.
///
/// The catalog usually offers 640, 300 and 64 pixel images. An exact size
/// match wins; otherwise the image with the closest edge length is used.
/// Images without dimensions are only used when nothing else is listed.
pub fn select_covers(images: &[ImageObject]) -> CoverUrls {
    CoverUrls {
        large: closest(images, CoverSize::Large.pixels()),
        small: closest(images, CoverSize::Small.pixels()),
    }
}

fn closest(images: &[ImageObject], target: u32) -> Option<String> {
    images
        .iter()
        .filter_map(|img| img.edge().map(|edge| (edge.abs_diff(target), img)))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, img)| img)
        .or_else(|| images.first())
        .map(|img| img.url.clone())
}
