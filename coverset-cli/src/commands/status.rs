use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use coverset_lib::CheckpointStore;
use coverset_lib::dataset::TABLE_FILE;
use coverset_lib::settings::load_settings;

use crate::error::CliError;

/// Skipped entities listed before the output is cut short.
const SKIPPED_PREVIEW: usize = 10;

/// Print the progress recorded in the checkpoint. Never writes anything.
pub(crate) fn run_status(output: Option<PathBuf>, all: bool) -> Result<(), CliError> {
    let settings = load_settings()?;
    let output_dir = settings.resolve_output_dir(output);
    let store = CheckpointStore::in_dir(&output_dir);

    log::info!(
        "{} {}",
        "Crawl status:".if_supports_color(Stdout, |t| t.bold()),
        output_dir.display().if_supports_color(Stdout, |t| t.cyan()),
    );
    log::info!("");

    let Some(checkpoint) = store.load()? else {
        log::info!(
            "  {}",
            "No checkpoint found; nothing has been crawled here yet."
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    };

    let summary = checkpoint.summary();
    let counts = checkpoint.frontier.counts();

    log::info!("  Units completed:  {}", summary.units_completed);
    log::info!("  Rows written:     {}", summary.records_written);
    log::info!("  Artists:          {}", summary.artists);
    log::info!(
        "  Albums:           {} ({} materialized)",
        summary.albums,
        summary.materialized,
    );

    let table = output_dir.join(TABLE_FILE);
    match std::fs::metadata(&table) {
        Ok(meta) if meta.len() != checkpoint.table_bytes => log::info!(
            "  Dataset table:    {} ({} bytes, {} committed; trimmed on next run)",
            table.display(),
            meta.len(),
            checkpoint.table_bytes,
        ),
        Ok(meta) => log::info!(
            "  Dataset table:    {} ({} bytes)",
            table.display(),
            meta.len(),
        ),
        Err(_) => log::warn!(
            "  Dataset table:    {}",
            "missing".if_supports_color(Stdout, |t| t.red()),
        ),
    }
    log::info!("");

    if counts.total() == 0 {
        log::info!(
            "  {} Frontier is empty",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Queued:           {} ({} genre seeds, {} related expansions, {} album fetches)",
            counts.total(),
            counts.genre_seeds,
            counts.related_expansions,
            counts.album_fetches,
        );
        if let Some(next) = checkpoint.frontier.peek() {
            log::info!(
                "{}",
                format!("  Next:             {}", next).if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
    }

    if !checkpoint.asset_retries.is_empty() {
        log::info!("");
        log::warn!(
            "  {} {} cover downloads pending retry:",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            checkpoint.asset_retries.len(),
        );
        for retry in &checkpoint.asset_retries {
            log::warn!(
                "    {} ({}), {} failed runs: {}",
                retry.album.name,
                retry.album.id,
                retry.attempts,
                retry.last_error.if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
    }

    if !checkpoint.skipped.is_empty() {
        log::info!("");
        log::info!(
            "  {} {} entities skipped:",
            "?".if_supports_color(Stdout, |t| t.yellow()),
            checkpoint.skipped.len(),
        );
        let shown = if all {
            checkpoint.skipped.len()
        } else {
            SKIPPED_PREVIEW
        };
        for skipped in checkpoint.skipped.iter().take(shown) {
            log::info!(
                "    {} {}: {}",
                skipped.kind,
                skipped.id,
                skipped.reason.if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
        if checkpoint.skipped.len() > shown {
            log::info!(
                "{}",
                format!(
                    "    ... and {} more (use --all to list them)",
                    checkpoint.skipped.len() - shown
                )
                .if_supports_color(Stdout, |t| t.dimmed()),
            );
        }
    }

    Ok(())
}
