//! The seams between the crawl and the outside world.
//!
//! The crawl is generic over these traits so it can run against the real
//! Spotify client or a scripted stand-in.

use coverset_core::{AlbumSummary, Artist, CoverUrls};

use crate::error::CatalogError;

/// Read access to a music catalog.
///
/// Returned artists carry the catalog's own genre tags in `catalog_genres`
/// and no provenance genres.
#[allow(async_fn_in_trait)]
pub trait CatalogClient {
    /// The most popular artists tagged with `genre`, at most `limit`.
    async fn top_artists_for_genre(
        &self,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<Artist>, CatalogError>;

    async fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError>;

    /// Every album of the artist, all pages.
    async fn albums_for_artist(&self, artist_id: &str)
    -> Result<Vec<AlbumSummary>, CatalogError>;

    /// Large and small cover URLs for an album. Missing renditions are `None`.
    async fn cover_image_urls(&self, album_id: &str) -> Result<CoverUrls, CatalogError>;
}

/// Fetches cover image bytes.
#[allow(async_fn_in_trait)]
pub trait AssetFetcher {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}
