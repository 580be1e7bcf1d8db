//! Shared settings (`~/.config/coverset/settings.toml`).
//!
//! ```toml
//! [crawl]
//! output_dir = "/data/coverset"
//! top_artists_limit = 50
//! min_request_interval_ms = 200
//!
//! [spotify]
//! client_id = "..."
//! client_secret = "..."
//! ```
//!
//! The `[spotify]` table is read by the scraper's credential loader; this
//! module only owns `[crawl]`. Every field is optional.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::fs::atomic_write;

/// Output directory used when neither the CLI nor the settings name one.
pub const DEFAULT_OUTPUT_DIR: &str = "coverset-data";

/// Canonical path to the settings file.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("coverset").join("settings.toml")
}

/// Tunables for a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub output_dir: Option<PathBuf>,
    /// Seed artists requested per genre (the catalog caps this at 50).
    pub top_artists_limit: usize,
    /// Minimum spacing between catalog API calls.
    pub min_request_interval_ms: u64,
    /// Attempts per call before a transient failure counts as permanent.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Rate-limit waits longer than this stop the run instead of sleeping.
    pub max_rate_limit_wait_secs: u64,
    /// Timeout applied to every HTTP request.
    pub request_timeout_secs: u64,
    /// Log a progress summary every this many work units.
    pub summary_every: u64,
    /// Runs an album's cover download may fail before it is skipped.
    pub max_asset_retries: u32,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            top_artists_limit: 50,
            min_request_interval_ms: 200,
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            max_rate_limit_wait_secs: 900,
            request_timeout_secs: 30,
            summary_every: 100,
            max_asset_retries: 3,
        }
    }
}

impl CrawlSettings {
    /// Resolve the output directory using a priority chain:
    ///
    /// 1. CLI override (if `Some`)
    /// 2. `crawl.output_dir` in `settings.toml`
    /// 3. `./coverset-data`
    pub fn resolve_output_dir(&self, cli_override: Option<PathBuf>) -> PathBuf {
        cli_override
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }
}

#[derive(Deserialize, Default)]
struct SettingsFile {
    #[serde(default)]
    crawl: CrawlSettings,
}

/// Load `[crawl]` from the canonical settings file. A missing file yields
/// defaults.
pub fn load_settings() -> Result<CrawlSettings, SettingsError> {
    load_settings_from(&settings_path())
}

pub fn load_settings_from(path: &Path) -> Result<CrawlSettings, SettingsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CrawlSettings::default()),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let file: SettingsFile = toml::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.crawl)
}

/// Save (or clear) `crawl.output_dir` in the settings file at `path`.
///
/// Uses `toml::Value` for a surgical update so other tables (credentials)
/// are preserved.
pub fn save_output_dir(path: &Path, output_dir: Option<&Path>) -> io::Result<()> {
    let mut doc: toml::Value = if let Ok(contents) = std::fs::read_to_string(path) {
        contents
            .parse()
            .unwrap_or_else(|_| toml::Value::Table(Default::default()))
    } else {
        toml::Value::Table(Default::default())
    };

    let table = doc
        .as_table_mut()
        .ok_or_else(|| io::Error::other("settings.toml root is not a table"))?;
    let crawl = table
        .entry("crawl")
        .or_insert_with(|| toml::Value::Table(Default::default()));
    let crawl_table = crawl
        .as_table_mut()
        .ok_or_else(|| io::Error::other("[crawl] is not a table"))?;

    match output_dir {
        Some(p) => {
            crawl_table.insert(
                "output_dir".to_string(),
                toml::Value::String(p.to_string_lossy().into_owned()),
            );
        }
        None => {
            crawl_table.remove("output_dir");
        }
    }

    let serialized = toml::to_string_pretty(&doc).map_err(io::Error::other)?;
    atomic_write(path, serialized.as_bytes()).map_err(io::Error::other)
}

/// Load the full settings file as a pretty-printed TOML string for display.
/// Secrets in `[spotify]` are masked.
pub fn load_settings_string(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let mut doc: toml::Value = contents.parse().ok()?;
    if let Some(secret) = doc
        .get_mut("spotify")
        .and_then(|s| s.get_mut("client_secret"))
    {
        *secret = toml::Value::String("********".to_string());
    }
    toml::to_string_pretty(&doc).ok()
}
