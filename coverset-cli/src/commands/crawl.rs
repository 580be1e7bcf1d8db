use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use coverset_lib::async_util::run_with_events;
use coverset_lib::settings::load_settings;
use coverset_scraper::log::LOG_FILE;
use coverset_scraper::{
    CatalogError, CrawlEvent, CrawlOptions, CrawlOutcome, CrawlStatus, Credentials, SpotifyClient,
};

use crate::error::CliError;
use crate::spinner::Spinner;

/// Authenticate before any work starts so bad credentials fail fast.
pub(crate) async fn connect_spotify(
    creds: Credentials,
    timeout: Duration,
    quiet: bool,
) -> Result<SpotifyClient, CliError> {
    let spinner = Spinner::start(quiet, "Connecting to Spotify...");
    let client = SpotifyClient::new(creds, timeout)?;
    if let Err(e) = client.authenticate().await {
        spinner.clear();
        return Err(e.into());
    }
    spinner.clear();

    log::info!(
        "{} Connected to Spotify",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
    );
    Ok(client)
}

pub(crate) fn print_credentials_hint() {
    log::error!("");
    log::error!("Set credentials via environment variables:");
    log::error!("  SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET");
    log::error!("");
    log::error!(
        "Or add client_id and client_secret to [spotify] in {}",
        coverset_lib::settings::settings_path().display(),
    );
}

/// Run the crawl command.
pub(crate) fn run_crawl(
    genres_file: PathBuf,
    output: Option<PathBuf>,
    limit: Option<u64>,
    restart: bool,
    no_log: bool,
    quiet: bool,
) -> Result<(), CliError> {
    let settings = load_settings()?;
    let genres = coverset_lib::load_genres(&genres_file)?;
    let output_dir = settings.resolve_output_dir(output);

    let creds = match Credentials::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!(
                "{} {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                e,
            );
            print_credentials_hint();
            return Err(CliError::config("no Spotify credentials configured"));
        }
    };

    log::info!(
        "Crawling into: {}",
        output_dir.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    log::info!(
        "{}",
        format!("{} genres from {}", genres.len(), genres_file.display())
            .if_supports_color(Stdout, |t| t.dimmed()),
    );
    if let Some(n) = limit {
        log::info!(
            "{}",
            format!("Limit: {} work units", n).if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    if restart {
        log::info!(
            "{}",
            "Restart: discarding checkpoint and dataset table".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let mut options = CrawlOptions::new(output_dir, genres);
    options.settings = settings;
    options.max_units = limit;
    options.restart = restart;
    options.no_log = no_log;

    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))?;

    rt.block_on(async {
        let client = match connect_spotify(creds, timeout, quiet).await {
            Ok(c) => c,
            Err(e) => {
                if let CliError::Catalog(CatalogError::InvalidCredentials(_)) = e {
                    print_credentials_hint();
                }
                return Err(e);
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        install_stop_handler(Arc::clone(&stop));

        let spinner = Spinner::start(quiet, "Starting...");
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel::<CrawlEvent>();

        let crawl_future = coverset_scraper::crawl(&client, &client, &options, &stop, event_tx);
        let result = run_with_events(crawl_future, event_rx, |e| render_event(&spinner, e)).await;
        spinner.clear();

        let outcome = result?;
        print_outcome(&outcome, &options);
        Ok::<(), CliError>(())
    })
}

/// First Ctrl-C asks the crawl to stop after the current unit; a second one
/// exits immediately. Both leave a consistent checkpoint because every write
/// is an atomic replace.
fn install_stop_handler(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if stop.swap(true, Ordering::SeqCst) {
                log::warn!("Interrupted again, exiting");
                std::process::exit(130);
            }
            log::warn!(
                "{} Stopping after the current work unit (Ctrl-C again to exit now)",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            );
        }
    });
}

fn render_event(spinner: &Spinner, event: CrawlEvent) {
    match event {
        CrawlEvent::Resumed {
            units_completed,
            queued,
            new_genres,
        } => {
            spinner.println(|| {
                log::info!(
                    "{} Resuming after {} units ({} queued{})",
                    "\u{21BB}".if_supports_color(Stdout, |t| t.cyan()),
                    units_completed,
                    queued,
                    if new_genres > 0 {
                        format!(", {} new genres", new_genres)
                    } else {
                        String::new()
                    },
                )
            });
        }
        CrawlEvent::Started { queued } => {
            spinner.println(|| log::info!("Starting a new crawl with {} genres queued", queued));
        }
        CrawlEvent::RetryingAssets { count } => {
            spinner.set_message(format!("Retrying {} parked cover downloads", count));
        }
        CrawlEvent::UnitStarted { index, unit } => {
            spinner.set_message(format!("[{}] {}", index + 1, unit));
        }
        CrawlEvent::AlbumMaterialized { album, artist } => {
            log::debug!("Materialized \"{}\" by {}", album, artist);
            spinner.set_message(format!("{} - {}", artist, album));
        }
        CrawlEvent::AlbumDeferred {
            album,
            attempts,
            reason,
        } => {
            spinner.println(|| {
                log::warn!(
                    "  {} \"{}\" deferred (attempt {}): {}",
                    "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                    album,
                    attempts,
                    reason,
                )
            });
        }
        CrawlEvent::EntitySkipped(skipped) => {
            spinner.println(|| {
                log::warn!(
                    "  {} Skipped {} {}: {}",
                    "?".if_supports_color(Stdout, |t| t.yellow()),
                    skipped.kind,
                    skipped.id,
                    skipped.reason,
                )
            });
        }
        CrawlEvent::Retrying {
            label,
            attempt,
            delay,
        } => {
            log::debug!("Retrying {} (attempt {}) in {:?}", label, attempt, delay);
            spinner.set_message(format!(
                "Retrying {} in {:.1}s (attempt {})",
                label,
                delay.as_secs_f32(),
                attempt,
            ));
        }
        CrawlEvent::RateLimited { retry_after } => {
            spinner.println(|| {
                log::warn!(
                    "  {} Rate limited, waiting {}s",
                    "\u{23F3}".if_supports_color(Stdout, |t| t.yellow()),
                    retry_after.as_secs(),
                )
            });
            spinner.set_message(format!("Rate limited, waiting {}s", retry_after.as_secs()));
        }
        CrawlEvent::Progress(summary) => {
            spinner.println(|| {
                log::info!(
                    "  {}",
                    summary.to_string().if_supports_color(Stdout, |t| t.dimmed()),
                )
            });
        }
        CrawlEvent::Finished { .. } => {}
    }
}

fn print_outcome(outcome: &CrawlOutcome, options: &CrawlOptions) {
    log::info!("");
    match outcome.status {
        CrawlStatus::Completed => log::info!(
            "{} Crawl complete",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        ),
        CrawlStatus::UnitLimitReached => log::info!(
            "{} Unit limit reached; rerun to continue",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        ),
        status => log::warn!(
            "{} Crawl paused: {}",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            status,
        ),
    }

    let run = outcome.log.summary();
    let totals = outcome.summary;
    log::info!(
        "  This run: {} albums materialized, {} deferred, {} skipped",
        run.materialized,
        run.deferred,
        run.skipped(),
    );
    log::info!(
        "  API calls: {} ({} retries, {} rate-limit waits)",
        outcome.calls.calls,
        outcome.calls.retries,
        outcome.calls.rate_limit_waits,
    );
    log::info!(
        "  Dataset: {} rows, {} artists, {} albums",
        totals.records_written,
        totals.artists,
        totals.albums,
    );
    if totals.frontier > 0 {
        log::info!(
            "{}",
            format!("  {} work units still queued", totals.frontier)
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    if totals.pending_retries > 0 {
        log::warn!(
            "  {} {} cover downloads will be retried next run",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            totals.pending_retries,
        );
    }
    if !options.no_log {
        log::info!(
            "{}",
            format!("  Log: {}", options.output_dir.join(LOG_FILE).display())
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
}
