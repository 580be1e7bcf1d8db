use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use coverset_core::{AlbumSummary, Artist, CoverUrls};

use crate::catalog::{AssetFetcher, CatalogClient};
use crate::credentials::Credentials;
use crate::error::CatalogError;
use crate::types::{
    AlbumObject, ArtistSearchResponse, ErrorResponse, Paging, RelatedArtistsResponse,
    TokenResponse, select_covers,
};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
/// Largest page size the Web API accepts.
const PAGE_LIMIT: usize = 50;
/// Used when a 429 response carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
/// Refresh tokens this long before they expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// Cover URLs from the most recent album listing, so most albums need no
/// extra call. Holds one artist's albums at a time.
#[derive(Default)]
struct CoverCache {
    covers: HashMap<String, CoverUrls>,
}

impl CoverCache {
    /// Forget the previous listing.
    fn begin_listing(&mut self) {
        self.covers.clear();
    }

    fn remember(&mut self, albums: &[AlbumObject]) {
        for album in albums {
            self.covers.insert(album.id.clone(), select_covers(&album.images));
        }
    }

    fn take(&mut self, album_id: &str) -> Option<CoverUrls> {
        self.covers.remove(album_id)
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// HTTP client for the Spotify Web API using the client-credentials flow.
///
/// Pacing and retries are the governor's job; this client maps every
/// response to a value or a classified [`CatalogError`]. It also serves as
/// the cover downloader.
pub struct SpotifyClient {
    http: reqwest::Client,
    creds: Credentials,
    api_base: String,
    token_url: String,
    token: Mutex<Option<AccessToken>>,
    covers: Mutex<CoverCache>,
}

impl SpotifyClient {
    pub fn new(creds: Credentials, timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coverset/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            creds,
            api_base: API_BASE.to_string(),
            token_url: TOKEN_URL.to_string(),
            token: Mutex::new(None),
            covers: Mutex::new(CoverCache::default()),
        })
    }

    /// Point the client at different endpoints (a proxy or a local stub).
    pub fn with_endpoints(mut self, api_base: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.token_url = token_url.into();
        self
    }

    /// Fetch a token now so bad credentials fail before any work starts.
    pub async fn authenticate(&self) -> Result<(), CatalogError> {
        self.bearer().await.map(|_| ())
    }

    async fn bearer(&self) -> Result<String, CatalogError> {
        let mut token = self.token.lock().await;
        if let Some(t) = token.as_ref() {
            if Instant::now() + TOKEN_MARGIN < t.expires_at {
                return Ok(t.value.clone());
            }
        }
        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *token = Some(fresh);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<AccessToken, CatalogError> {
        log::debug!("Requesting Spotify access token");
        let resp = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CatalogError::InvalidCredentials(
                "Spotify rejected the client id or secret".to_string(),
            ));
        }
        let token: TokenResponse = read_json(resp).await?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// GET a Web API resource. A 401 refreshes the token once; a second 401
    /// means the credentials are no good.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let mut refreshed = false;
        loop {
            let token = self.bearer().await?;
            let resp = self
                .http
                .get(url)
                .query(query)
                .bearer_auth(token)
                .send()
                .await?;

            if resp.status() == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                log::debug!("Access token rejected, refreshing");
                self.invalidate_token().await;
                refreshed = true;
                continue;
            }
            return read_json(resp).await;
        }
    }

}

impl CatalogClient for SpotifyClient {
    async fn top_artists_for_genre(
        &self,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<Artist>, CatalogError> {
        let limit = limit.min(PAGE_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = [
            ("q", format!("genre:\"{}\"", genre)),
            ("type", "artist".to_string()),
            ("limit", limit.to_string()),
        ];
        let resp: ArtistSearchResponse = self
            .get_json(&format!("{}/search", self.api_base), &query)
            .await?;
        Ok(resp.artists.items.into_iter().map(Artist::from).collect())
    }

    async fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError> {
        let resp: RelatedArtistsResponse = self
            .get_json(
                &format!("{}/artists/{}/related-artists", self.api_base, artist_id),
                &[],
            )
            .await?;
        Ok(resp.artists.into_iter().map(Artist::from).collect())
    }

    async fn albums_for_artist(
        &self,
        artist_id: &str,
    ) -> Result<Vec<AlbumSummary>, CatalogError> {
        self.covers.lock().await.begin_listing();
        let mut summaries = Vec::new();
        let first_query = [
            ("include_groups", "album".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let mut page: Paging<AlbumObject> = self
            .get_json(
                &format!("{}/artists/{}/albums", self.api_base, artist_id),
                &first_query,
            )
            .await?;

        loop {
            self.covers.lock().await.remember(&page.items);
            summaries.extend(page.items.iter().map(AlbumObject::summary));
            match page.next.take() {
                // `next` already carries the query string
                Some(next) => page = self.get_json(&next, &[]).await?,
                None => break,
            }
        }
        Ok(summaries)
    }

    async fn cover_image_urls(&self, album_id: &str) -> Result<CoverUrls, CatalogError> {
        if let Some(cached) = self.covers.lock().await.take(album_id) {
            return Ok(cached);
        }
        let album: AlbumObject = self
            .get_json(&format!("{}/albums/{}", self.api_base, album_id), &[])
            .await?;
        Ok(select_covers(&album.images))
    }
}

impl AssetFetcher for SpotifyClient {
    /// Download a cover image. CDN downloads are not paced and carry no
    /// token. The body must be non-empty and sniff as a known image format.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let resp = self.http.get(url).send().await?;
        check_status(&resp)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &text));
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(CatalogError::NotAnImage(format!("{url}: empty body")));
        }
        image::guess_format(&bytes)
            .map_err(|e| CatalogError::NotAnImage(format!("{url}: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Fail fast on a rate-limit response, reading `Retry-After`.
fn check_status(resp: &reqwest::Response) -> Result<(), CatalogError> {
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(CatalogError::RateLimited { retry_after });
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, CatalogError> {
    check_status(&resp)?;
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(status_error(status.as_u16(), &text));
    }

    serde_json::from_str(&text).map_err(|e| {
        CatalogError::Api(format!(
            "Failed to parse response: {e}. Response: {}",
            excerpt(&text)
        ))
    })
}

fn status_error(status: u16, body: &str) -> CatalogError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| excerpt(body));
    match status {
        401 | 403 => CatalogError::InvalidCredentials(message),
        404 => CatalogError::NotFound(message),
        500..=599 => CatalogError::ServerError { status, message },
        _ => CatalogError::Rejected { status, message },
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}
