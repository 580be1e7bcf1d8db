use std::path::Path;

use coverset_core::{EntityKind, SkippedEntity};
use coverset_lib::ProgressSummary;

/// File name of the run log inside the output directory.
pub const LOG_FILE: &str = "crawl-log.txt";

/// A single entry in the crawl log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Materialized {
        album_id: String,
        album: String,
        artist: String,
        genre: String,
    },
    /// Cover download failed; parked for a later run.
    Deferred {
        album_id: String,
        album: String,
        attempts: u32,
        reason: String,
    },
    Skipped(SkippedEntity),
    /// The run ended early.
    Stopped { reason: String },
}

/// Collects what one run did and writes it as a log file.
#[derive(Debug, Default)]
pub struct CrawlLog {
    entries: Vec<LogEntry>,
}

impl CrawlLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn summary(&self) -> LogSummary {
        let mut summary = LogSummary::default();
        for entry in &self.entries {
            match entry {
                LogEntry::Materialized { .. } => summary.materialized += 1,
                LogEntry::Deferred { .. } => summary.deferred += 1,
                LogEntry::Skipped(s) => match s.kind {
                    EntityKind::Genre => summary.skipped_genres += 1,
                    EntityKind::Artist => summary.skipped_artists += 1,
                    EntityKind::Album => summary.skipped_albums += 1,
                },
                LogEntry::Stopped { .. } => {}
            }
        }
        summary
    }

    /// Write the log to a file, with the dataset totals after this run.
    pub fn write_to_file(&self, path: &Path, totals: &ProgressSummary) -> std::io::Result<()> {
        use std::io::Write;

        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        let summary = self.summary();

        writeln!(file, "=== Crawl Log ===")?;
        writeln!(
            file,
            "Date: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(file)?;
        writeln!(file, "--- This run ---")?;
        writeln!(file, "Materialized: {}", summary.materialized)?;
        writeln!(file, "Deferred downloads: {}", summary.deferred)?;
        writeln!(
            file,
            "Skipped: {} (genres: {}, artists: {}, albums: {})",
            summary.skipped(),
            summary.skipped_genres,
            summary.skipped_artists,
            summary.skipped_albums
        )?;
        writeln!(file)?;
        writeln!(file, "--- Dataset ---")?;
        writeln!(file, "{}", totals)?;
        writeln!(file)?;
        writeln!(file, "--- Details ---")?;
        writeln!(file)?;

        for entry in &self.entries {
            match entry {
                LogEntry::Materialized {
                    album_id,
                    album,
                    artist,
                    genre,
                } => {
                    writeln!(file, "[OK] {} \"{}\" by {} [{}]", album_id, album, artist, genre)?;
                }
                LogEntry::Deferred {
                    album_id,
                    album,
                    attempts,
                    reason,
                } => {
                    writeln!(
                        file,
                        "[DEFERRED] {} \"{}\" (failed runs: {})",
                        album_id, album, attempts
                    )?;
                    writeln!(file, "     Error: {}", reason)?;
                }
                LogEntry::Skipped(skipped) => {
                    writeln!(file, "[SKIPPED] {}", skipped)?;
                }
                LogEntry::Stopped { reason } => {
                    writeln!(file, "[STOPPED] {}", reason)?;
                }
            }
        }

        file.flush()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    pub materialized: usize,
    pub deferred: usize,
    pub skipped_genres: usize,
    pub skipped_artists: usize,
    pub skipped_albums: usize,
}

impl LogSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_genres + self.skipped_artists + self.skipped_albums
    }
}
