//! Turning a ledger album into two cover files and one dataset row.
//!
//! A row is appended only once both covers are on disk, and the album is
//! marked materialized only after the row is written. A failed download
//! parks the album in the retry list instead; files already on disk are kept
//! and not fetched again.

use coverset_core::{
    Album, Artist, CoverSize, DatasetRecord, EntityKind, PendingAssetRetry, SkippedEntity,
};
use coverset_lib::{AssetLayout, DatasetTable};

use crate::catalog::AssetFetcher;
use crate::crawl::{CrawlEvent, RunContext};
use crate::error::Interrupt;
use crate::governor::CallKind;
use crate::log::LogEntry;

/// What happened to an album handed to the materializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Materialized(DatasetRecord),
    /// Already has its row; nothing was done.
    AlreadyMaterialized,
    /// Download failed; parked for the next run.
    Deferred { attempts: u32, reason: String },
    /// Download failed too many times; the album is skipped for good.
    GaveUp(SkippedEntity),
}

pub struct Materializer<'a, F> {
    fetcher: &'a F,
    layout: AssetLayout,
    table: DatasetTable,
    max_asset_retries: u32,
}

impl<'a, F: AssetFetcher> Materializer<'a, F> {
    pub fn new(fetcher: &'a F, layout: AssetLayout, table: DatasetTable, max_asset_retries: u32) -> Self {
        Self {
            fetcher,
            layout,
            table,
            max_asset_retries: max_asset_retries.max(1),
        }
    }

    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Current byte length of the dataset table.
    pub fn table_bytes(&self) -> u64 {
        self.table.len_bytes()
    }

    /// Materialize an album that is already recorded in the ledger.
    pub async fn materialize(
        &mut self,
        album: &Album,
        ctx: &mut RunContext,
    ) -> Result<MaterializeOutcome, Interrupt> {
        if ctx.state.ledger.is_materialized(&album.id) {
            return Ok(MaterializeOutcome::AlreadyMaterialized);
        }

        if let Some(reason) = self.fetch_covers(album, ctx).await? {
            return Ok(self.defer(album, reason, ctx));
        }

        let record = self.commit(album, ctx)?;
        Ok(MaterializeOutcome::Materialized(record))
    }

    /// Retry a parked album using its stored URLs.
    pub async fn retry(
        &mut self,
        album_id: &str,
        ctx: &mut RunContext,
    ) -> Result<Option<MaterializeOutcome>, Interrupt> {
        let Some(album) = ctx
            .state
            .asset_retries
            .iter()
            .find(|r| r.album.id == album_id)
            .map(|r| r.album.clone())
        else {
            return Ok(None);
        };
        log::debug!("Retrying cover download for {}", album.id);
        self.materialize(&album, ctx).await.map(Some)
    }

    /// Download whichever cover sizes are missing. Returns the failure
    /// reason if any size could not be fetched.
    async fn fetch_covers(
        &self,
        album: &Album,
        ctx: &mut RunContext,
    ) -> Result<Option<String>, Interrupt> {
        let mut failures = Vec::new();
        for size in CoverSize::ALL {
            if self.layout.is_present(&album.artist_id, &album.id, size) {
                continue;
            }
            let url = album.cover_url(size);
            let label = format!("cover {} {}", album.id, size);
            match ctx
                .governor
                .call(CallKind::Asset, &label, || self.fetcher.fetch_image(url))
                .await
            {
                Ok(bytes) => {
                    self.layout.write(&album.artist_id, &album.id, size, &bytes)?;
                }
                Err(escalation) => {
                    let reason = escalation.skip_reason()?;
                    failures.push(format!("{}: {}", size, reason));
                }
            }
        }
        if failures.is_empty() {
            Ok(None)
        } else {
            Ok(Some(failures.join("; ")))
        }
    }

    fn commit(&mut self, album: &Album, ctx: &mut RunContext) -> Result<DatasetRecord, Interrupt> {
        let artist = ctx.state.ledger.artist(&album.artist_id);
        let record = DatasetRecord {
            genre: artist.map(Artist::genre_label).unwrap_or_default(),
            artist: artist.map(|a| a.name.clone()).unwrap_or_default(),
            album: album.name.clone(),
            release_date: album.release_date.clone(),
            cover_path_large: self.layout.relative_path(
                &album.artist_id,
                &album.id,
                CoverSize::Large,
            )?,
            cover_path_small: self.layout.relative_path(
                &album.artist_id,
                &album.id,
                CoverSize::Small,
            )?,
        };

        self.table.append(&record)?;
        ctx.state.ledger.mark_materialized(&album.id);
        ctx.state.records_written += 1;
        ctx.state.asset_retries.retain(|r| r.album.id != album.id);

        log::debug!("Materialized {} ({})", album.id, album.name);
        ctx.log.add(LogEntry::Materialized {
            album_id: album.id.clone(),
            album: record.album.clone(),
            artist: record.artist.clone(),
            genre: record.genre.clone(),
        });
        ctx.emit(CrawlEvent::AlbumMaterialized {
            album: record.album.clone(),
            artist: record.artist.clone(),
        });
        Ok(record)
    }

    fn defer(&self, album: &Album, reason: String, ctx: &mut RunContext) -> MaterializeOutcome {
        let retries = &mut ctx.state.asset_retries;
        let attempts = match retries.iter_mut().find(|r| r.album.id == album.id) {
            Some(entry) => {
                entry.attempts += 1;
                entry.last_error = reason.clone();
                entry.attempts
            }
            None => {
                retries.push(PendingAssetRetry {
                    album: album.clone(),
                    attempts: 1,
                    last_error: reason.clone(),
                });
                1
            }
        };

        if attempts >= self.max_asset_retries {
            ctx.state.asset_retries.retain(|r| r.album.id != album.id);
            let skipped = SkippedEntity::new(
                EntityKind::Album,
                &album.id,
                format!("cover download failed {} times: {}", attempts, reason),
            );
            ctx.skip(skipped.clone());
            return MaterializeOutcome::GaveUp(skipped);
        }

        log::debug!(
            "Cover download for {} failed ({}), will retry next run",
            album.id,
            reason
        );
        ctx.log.add(LogEntry::Deferred {
            album_id: album.id.clone(),
            album: album.name.clone(),
            attempts,
            reason: reason.clone(),
        });
        ctx.emit(CrawlEvent::AlbumDeferred {
            album: album.name.clone(),
            attempts,
            reason: reason.clone(),
        });
        MaterializeOutcome::Deferred { attempts, reason }
    }
}
