//! The crawl driver: resume or start a run, replay parked downloads, then
//! work through the frontier one unit at a time, committing a checkpoint
//! after each.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio::time::Duration;

use coverset_core::{SkippedEntity, WorkUnit};
use coverset_lib::checkpoint::CHECKPOINT_FILE;
use coverset_lib::dataset::{TABLE_FILE, has_rows};
use coverset_lib::{
    AssetLayout, CheckpointStore, CrawlSettings, DatasetTable, ProgressSummary, RunCheckpoint,
    StorageError,
};

use crate::catalog::{AssetFetcher, CatalogClient};
use crate::error::{CrawlError, Interrupt};
use crate::governor::{Governor, GovernorStats};
use crate::log::{CrawlLog, LOG_FILE, LogEntry};
use crate::materialize::Materializer;
use crate::traversal::Traversal;

/// Options for a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Holds the checkpoint, the dataset table, the covers and the run log.
    pub output_dir: PathBuf,
    /// Genres to seed, in order. On resume, genres not seen before are
    /// appended to the frontier.
    pub genres: Vec<String>,
    pub settings: CrawlSettings,
    /// Stop after this many work units in this run.
    pub max_units: Option<u64>,
    /// Discard the checkpoint and table and start over. Cover files are kept.
    pub restart: bool,
    /// Don't write the run log file.
    pub no_log: bool,
}

impl CrawlOptions {
    pub fn new(output_dir: PathBuf, genres: Vec<String>) -> Self {
        Self {
            output_dir,
            genres,
            settings: CrawlSettings::default(),
            max_units: None,
            restart: false,
            no_log: false,
        }
    }
}

/// Progress events emitted during a crawl, consumed by the CLI.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    /// Continuing from a checkpoint.
    Resumed {
        units_completed: u64,
        queued: usize,
        new_genres: usize,
    },
    /// Fresh run with every genre queued.
    Started { queued: usize },
    /// Parked cover downloads are being retried before traversal resumes.
    RetryingAssets { count: usize },
    UnitStarted { index: u64, unit: WorkUnit },
    AlbumMaterialized { album: String, artist: String },
    AlbumDeferred {
        album: String,
        attempts: u32,
        reason: String,
    },
    EntitySkipped(SkippedEntity),
    /// A transient failure is being retried after `delay`.
    Retrying {
        label: String,
        attempt: u32,
        delay: Duration,
    },
    /// Suspended until the service's rate-limit window passes.
    RateLimited { retry_after: Duration },
    /// Periodic summary, every `summary_every` units.
    Progress(ProgressSummary),
    Finished {
        status: CrawlStatus,
        summary: ProgressSummary,
    },
}

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// The frontier is empty.
    Completed,
    /// `max_units` units were processed.
    UnitLimitReached,
    /// The stop flag was raised.
    StopRequested,
    /// A rate-limit window exceeded the configured maximum wait.
    RateLimited { retry_after: Duration },
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlStatus::Completed => write!(f, "completed"),
            CrawlStatus::UnitLimitReached => write!(f, "unit limit reached"),
            CrawlStatus::StopRequested => write!(f, "stopped on request"),
            CrawlStatus::RateLimited { retry_after } => write!(
                f,
                "rate limited for {}s; rerun to resume",
                retry_after.as_secs()
            ),
        }
    }
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub status: CrawlStatus,
    /// Counts as of the last committed checkpoint.
    pub summary: ProgressSummary,
    pub log: CrawlLog,
    pub calls: GovernorStats,
}

/// Mutable state threaded through one run.
pub struct RunContext {
    pub state: RunCheckpoint,
    pub governor: Governor,
    pub log: CrawlLog,
    events: mpsc::UnboundedSender<CrawlEvent>,
}

impl RunContext {
    pub fn new(
        state: RunCheckpoint,
        governor: Governor,
        events: mpsc::UnboundedSender<CrawlEvent>,
    ) -> Self {
        Self {
            state,
            governor,
            log: CrawlLog::new(),
            events,
        }
    }

    pub fn emit(&self, event: CrawlEvent) {
        let _ = self.events.send(event);
    }

    /// Record an entity as permanently skipped. An entity is listed once
    /// even if several units run into it.
    pub fn skip(&mut self, skipped: SkippedEntity) {
        log::debug!("Skipping {}", skipped);
        let known = self
            .state
            .skipped
            .iter()
            .any(|s| s.kind == skipped.kind && s.id == skipped.id);
        if !known {
            self.state.skipped.push(skipped.clone());
        }
        self.log.add(LogEntry::Skipped(skipped.clone()));
        self.emit(CrawlEvent::EntitySkipped(skipped));
    }
}

/// Run (or resume) a crawl into `options.output_dir`.
///
/// The run ends when the frontier is empty, `max_units` units have been
/// processed, `stop` is raised, or the catalog asks for a pause longer than
/// the configured maximum. In every case the checkpoint on disk reflects the
/// last completed unit and a later call resumes from it.
pub async fn crawl<C, F>(
    catalog: &C,
    fetcher: &F,
    options: &CrawlOptions,
    stop: &AtomicBool,
    events: mpsc::UnboundedSender<CrawlEvent>,
) -> Result<CrawlOutcome, CrawlError>
where
    C: CatalogClient,
    F: AssetFetcher,
{
    let output_dir = &options.output_dir;
    std::fs::create_dir_all(output_dir).map_err(|e| StorageError::io(output_dir, e))?;

    let store = CheckpointStore::in_dir(output_dir);
    let table_path = output_dir.join(TABLE_FILE);

    if options.restart {
        log::debug!("Discarding previous progress in {}", output_dir.display());
        store.remove()?;
        remove_if_exists(&table_path)?;
    }

    let (state, table) = open_run(&store, &table_path, options, &events)?;

    let settings = &options.settings;
    let governor = Governor::from_settings(settings).with_events(events.clone());
    let mut ctx = RunContext::new(state, governor, events.clone());
    let mut committed = ctx.state.summary();
    let mut materializer = Materializer::new(
        fetcher,
        AssetLayout::new(output_dir),
        table,
        settings.max_asset_retries,
    );
    let traversal = Traversal::new(catalog, settings.top_artists_limit);

    let result = drive(
        &traversal,
        &mut materializer,
        &mut ctx,
        &store,
        options,
        stop,
        &mut committed,
    )
    .await;

    let status = match result {
        Ok(status) => status,
        Err(Interrupt::RateLimitStop(retry_after)) => CrawlStatus::RateLimited { retry_after },
        Err(Interrupt::Abort(e)) => {
            log::debug!("Crawl aborted: {}", e);
            ctx.log.add(LogEntry::Stopped {
                reason: e.to_string(),
            });
            write_log(options, &ctx.log, &committed);
            return Err(e);
        }
    };

    if status != CrawlStatus::Completed {
        ctx.log.add(LogEntry::Stopped {
            reason: status.to_string(),
        });
    }
    log::debug!("Crawl {}: {}", status, committed);
    write_log(options, &ctx.log, &committed);
    ctx.emit(CrawlEvent::Finished {
        status,
        summary: committed,
    });

    Ok(CrawlOutcome {
        status,
        summary: committed,
        calls: ctx.governor.stats(),
        log: ctx.log,
    })
}

/// Load the checkpoint and reopen the table, or start a fresh run.
fn open_run(
    store: &CheckpointStore,
    table_path: &Path,
    options: &CrawlOptions,
    events: &mpsc::UnboundedSender<CrawlEvent>,
) -> Result<(RunCheckpoint, DatasetTable), CrawlError> {
    if let Some(mut state) = store.load()? {
        let table = DatasetTable::open_at(table_path, state.table_bytes)?;
        let new_genres = state.frontier.extend_genres(options.genres.iter().cloned());
        log::debug!(
            "Resuming at unit {} with {} units queued ({} new genres)",
            state.units_completed,
            state.frontier.len(),
            new_genres
        );
        let _ = events.send(CrawlEvent::Resumed {
            units_completed: state.units_completed,
            queued: state.frontier.len(),
            new_genres,
        });
        return Ok((state, table));
    }

    if has_rows(table_path) {
        return Err(CrawlError::Config(format!(
            "{} has rows but there is no {}; rerun with --restart to start over",
            table_path.display(),
            CHECKPOINT_FILE
        )));
    }
    if options.genres.is_empty() {
        return Err(CrawlError::Config("no genres to seed".to_string()));
    }

    let table = DatasetTable::create(table_path)?;
    let state = RunCheckpoint::fresh(options.genres.iter().cloned(), table.len_bytes());
    store.save(&state)?;
    log::debug!("Starting a new crawl with {} genres", options.genres.len());
    let _ = events.send(CrawlEvent::Started {
        queued: state.frontier.len(),
    });
    Ok((state, table))
}

async fn drive<C: CatalogClient, F: AssetFetcher>(
    traversal: &Traversal<'_, C>,
    materializer: &mut Materializer<'_, F>,
    ctx: &mut RunContext,
    store: &CheckpointStore,
    options: &CrawlOptions,
    stop: &AtomicBool,
    committed: &mut ProgressSummary,
) -> Result<CrawlStatus, Interrupt> {
    // Parked downloads need no catalog calls; settle them first.
    let parked: Vec<String> = ctx
        .state
        .asset_retries
        .iter()
        .map(|r| r.album.id.clone())
        .collect();
    if !parked.is_empty() {
        log::debug!("Retrying {} parked cover downloads", parked.len());
        ctx.emit(CrawlEvent::RetryingAssets {
            count: parked.len(),
        });
    }
    for album_id in parked {
        if stop.load(Ordering::Relaxed) {
            return Ok(CrawlStatus::StopRequested);
        }
        materializer.retry(&album_id, ctx).await?;
        *committed = commit(ctx, materializer, store)?;
    }

    let summary_every = options.settings.summary_every;
    let mut units_this_run = 0u64;
    while let Some(unit) = ctx.state.frontier.peek().cloned() {
        if stop.load(Ordering::Relaxed) {
            return Ok(CrawlStatus::StopRequested);
        }
        if options.max_units.is_some_and(|max| units_this_run >= max) {
            return Ok(CrawlStatus::UnitLimitReached);
        }

        let index = ctx.state.units_completed;
        log::debug!("Unit {}: {}", index, unit);
        ctx.emit(CrawlEvent::UnitStarted {
            index,
            unit: unit.clone(),
        });

        traversal.run_unit(&unit, ctx, materializer).await?;

        ctx.state.frontier.complete_front();
        ctx.state.units_completed += 1;
        units_this_run += 1;
        *committed = commit(ctx, materializer, store)?;

        if summary_every > 0 && ctx.state.units_completed % summary_every == 0 {
            log::debug!("{}", committed);
            ctx.emit(CrawlEvent::Progress(*committed));
        }
    }
    Ok(CrawlStatus::Completed)
}

/// Persist the current state. The table is flushed row by row, so its
/// length now covers everything the state counts.
fn commit<F>(
    ctx: &mut RunContext,
    materializer: &Materializer<'_, F>,
    store: &CheckpointStore,
) -> Result<ProgressSummary, StorageError>
where
    F: AssetFetcher,
{
    ctx.state.table_bytes = materializer.table_bytes();
    store.save(&ctx.state)?;
    Ok(ctx.state.summary())
}

fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn write_log(options: &CrawlOptions, run_log: &CrawlLog, totals: &ProgressSummary) {
    if options.no_log {
        return;
    }
    let path = options.output_dir.join(LOG_FILE);
    if let Err(e) = run_log.write_to_file(&path, totals) {
        log::warn!("Failed to write crawl log {}: {}", path.display(), e);
    }
}
