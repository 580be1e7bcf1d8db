//! A scripted in-memory catalog for crawl tests.
//!
//! Every call is recorded as `kind:target` (`top:thrash-metal`,
//! `related:slayer`, `albums:slayer`, `covers:reign`, `image:<url>`), and
//! failures can be queued per call key. Queued failures are consumed in
//! order; once a key's queue is empty the call succeeds.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;

use tokio::sync::mpsc;

use coverset_core::{AlbumSummary, Artist, CoverSize, CoverUrls};
use coverset_lib::CheckpointStore;
use coverset_lib::RunCheckpoint;
use coverset_lib::dataset::{TABLE_FILE, read_records};
use coverset_scraper::{
    AssetFetcher, CatalogClient, CatalogError, CrawlError, CrawlEvent, CrawlOptions,
    CrawlOutcome, crawl,
};

#[derive(Default)]
pub struct ScriptedCatalog {
    top: HashMap<String, Vec<Artist>>,
    related: HashMap<String, Vec<Artist>>,
    albums: HashMap<String, Vec<AlbumSummary>>,
    covers: HashMap<String, CoverUrls>,
    images: HashMap<String, Vec<u8>>,
    failures: Mutex<HashMap<String, VecDeque<CatalogError>>>,
    calls: Mutex<Vec<String>>,
}

pub fn cover_url(album_id: &str, size: CoverSize) -> String {
    format!("https://i.scdn.test/{}/{}", album_id, size.pixels())
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Top artists for a genre, as `(id, name)` pairs.
    pub fn genre(mut self, genre: &str, artists: &[(&str, &str)]) -> Self {
        self.top.insert(
            genre.to_string(),
            artists
                .iter()
                .map(|(id, name)| {
                    Artist::new(*id, *name).with_catalog_genres(vec![genre.replace('-', " ")])
                })
                .collect(),
        );
        self
    }

    /// Related artists; their catalog genre is `catalog_genre`.
    pub fn related(mut self, artist_id: &str, catalog_genre: &str, artists: &[(&str, &str)]) -> Self {
        self.related.insert(
            artist_id.to_string(),
            artists
                .iter()
                .map(|(id, name)| {
                    Artist::new(*id, *name).with_catalog_genres(vec![catalog_genre.to_string()])
                })
                .collect(),
        );
        self
    }

    /// An album with both cover sizes available.
    pub fn album(self, artist_id: &str, album_id: &str, name: &str, date: &str) -> Self {
        let large = cover_url(album_id, CoverSize::Large);
        let small = cover_url(album_id, CoverSize::Small);
        let mut this = self.album_without_covers(artist_id, album_id, name, date);
        this.covers
            .insert(album_id.to_string(), CoverUrls::new(large.clone(), small.clone()));
        this.images
            .insert(large.clone(), format!("jpeg:{}", large).into_bytes());
        this.images
            .insert(small.clone(), format!("jpeg:{}", small).into_bytes());
        this
    }

    /// An album the catalog lists but has no artwork for.
    pub fn album_without_covers(mut self, artist_id: &str, album_id: &str, name: &str, date: &str) -> Self {
        self.albums
            .entry(artist_id.to_string())
            .or_default()
            .push(AlbumSummary {
                id: album_id.to_string(),
                name: name.to_string(),
                release_date: date.to_string(),
            });
        self.covers.insert(album_id.to_string(), CoverUrls::default());
        self
    }

    /// Queue a failure for the next call with this key.
    pub fn fail(&self, call: &str, error: CatalogError) {
        self.failures
            .lock()
            .unwrap()
            .entry(call.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn fail_times(&self, call: &str, times: usize, error: impl Fn() -> CatalogError) {
        for _ in 0..times {
            self.fail(call, error());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn hit(&self, call: String) -> Result<(), CatalogError> {
        self.calls.lock().unwrap().push(call.clone());
        match self.failures.lock().unwrap().get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl CatalogClient for ScriptedCatalog {
    async fn top_artists_for_genre(&self, genre: &str, limit: usize) -> Result<Vec<Artist>, CatalogError> {
        self.hit(format!("top:{}", genre))?;
        Ok(self
            .top
            .get(genre)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn related_artists(&self, artist_id: &str) -> Result<Vec<Artist>, CatalogError> {
        self.hit(format!("related:{}", artist_id))?;
        Ok(self.related.get(artist_id).cloned().unwrap_or_default())
    }

    async fn albums_for_artist(&self, artist_id: &str) -> Result<Vec<AlbumSummary>, CatalogError> {
        self.hit(format!("albums:{}", artist_id))?;
        Ok(self.albums.get(artist_id).cloned().unwrap_or_default())
    }

    async fn cover_image_urls(&self, album_id: &str) -> Result<CoverUrls, CatalogError> {
        self.hit(format!("covers:{}", album_id))?;
        self.covers
            .get(album_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(album_id.to_string()))
    }
}

impl AssetFetcher for ScriptedCatalog {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.hit(format!("image:{}", url))?;
        self.images
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(url.to_string()))
    }
}

/// Two thrash seeds, each with one related artist, one album per artist.
pub fn thrash_scenario() -> ScriptedCatalog {
    ScriptedCatalog::new()
        .genre("thrash-metal", &[("slayer", "Slayer"), ("metallica", "Metallica")])
        .related("slayer", "bay area thrash", &[("exodus", "Exodus")])
        .related("metallica", "speed metal", &[("megadeth", "Megadeth")])
        .album("slayer", "reign", "Reign in Blood", "1986-10-07")
        .album("metallica", "puppets", "Master of Puppets", "1986-03-03")
        .album("exodus", "bonded", "Bonded by Blood", "1985-04-25")
        .album("megadeth", "peace", "Peace Sells... but Who's Buying?", "1986-09-19")
}

/// Options tuned for tests: no pacing, short backoff.
pub fn options(dir: &Path, genres: &[&str]) -> CrawlOptions {
    let mut options = CrawlOptions::new(
        dir.to_path_buf(),
        genres.iter().map(|g| g.to_string()).collect(),
    );
    options.settings.min_request_interval_ms = 0;
    options.settings.backoff_base_ms = 10;
    options.settings.backoff_max_ms = 100;
    options.settings.max_attempts = 3;
    options.settings.max_rate_limit_wait_secs = 60;
    options
}

pub async fn try_run(catalog: &ScriptedCatalog, options: &CrawlOptions) -> Result<CrawlOutcome, CrawlError> {
    let (tx, _rx) = mpsc::unbounded_channel();
    crawl(catalog, catalog, options, &AtomicBool::new(false), tx).await
}

pub async fn run(catalog: &ScriptedCatalog, options: &CrawlOptions) -> CrawlOutcome {
    try_run(catalog, options).await.unwrap()
}

/// Run and collect every event emitted.
pub async fn run_with_events(
    catalog: &ScriptedCatalog,
    options: &CrawlOptions,
    stop: &AtomicBool,
) -> (CrawlOutcome, Vec<CrawlEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let outcome = crawl(catalog, catalog, options, stop, tx).await.unwrap();
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (outcome, events)
}

pub fn checkpoint(dir: &Path) -> RunCheckpoint {
    CheckpointStore::in_dir(dir).load().unwrap().unwrap()
}

pub fn table_bytes(dir: &Path) -> Vec<u8> {
    std::fs::read(dir.join(TABLE_FILE)).unwrap()
}

pub fn checkpoint_bytes(dir: &Path) -> Vec<u8> {
    std::fs::read(CheckpointStore::in_dir(dir).path()).unwrap()
}

/// `(artist, album)` for every table row, in order.
pub fn rows(dir: &Path) -> Vec<(String, String)> {
    read_records(&dir.join(TABLE_FILE))
        .unwrap()
        .into_iter()
        .map(|r| (r.artist, r.album))
        .collect()
}
