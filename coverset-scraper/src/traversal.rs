//! One step of the crawl per work unit.
//!
//! Seeding a genre registers its top artists and queues relation expansion
//! and album fetch for the newly seen ones. Expanding an artist registers its
//! related artists and queues only their album fetch, so relations are
//! followed one hop out from the seeds. Fetching albums resolves covers for every album
//! not yet in the ledger and hands each to the materializer.
//!
//! A unit whose catalog call fails permanently records a skip and still
//! counts as done. Rate-limit stops and fatal errors propagate, leaving the
//! unit at the head of the frontier.

use coverset_core::{Album, EntityKind, SkippedEntity, WorkUnit, validate_path_component};

use crate::catalog::{AssetFetcher, CatalogClient};
use crate::crawl::RunContext;
use crate::error::Interrupt;
use crate::governor::CallKind;
use crate::materialize::Materializer;

pub struct Traversal<'a, C> {
    catalog: &'a C,
    top_artists_limit: usize,
}

impl<'a, C: CatalogClient> Traversal<'a, C> {
    pub fn new(catalog: &'a C, top_artists_limit: usize) -> Self {
        Self {
            catalog,
            top_artists_limit,
        }
    }

    /// Process one unit. The caller commits it on `Ok`.
    pub async fn run_unit<F: AssetFetcher>(
        &self,
        unit: &WorkUnit,
        ctx: &mut RunContext,
        materializer: &mut Materializer<'_, F>,
    ) -> Result<(), Interrupt> {
        match unit {
            WorkUnit::GenreSeed(genre) => self.seed_genre(genre, ctx).await,
            WorkUnit::RelatedExpansion(artist_id) => self.expand_related(artist_id, ctx).await,
            WorkUnit::AlbumFetch(artist_id) => {
                self.fetch_albums(artist_id, ctx, materializer).await
            }
        }
    }

    async fn seed_genre(&self, genre: &str, ctx: &mut RunContext) -> Result<(), Interrupt> {
        let label = format!("top artists for \"{}\"", genre);
        let artists = match ctx
            .governor
            .call(CallKind::Catalog, &label, || {
                self.catalog
                    .top_artists_for_genre(genre, self.top_artists_limit)
            })
            .await
        {
            Ok(artists) => artists,
            Err(escalation) => {
                let reason = escalation.skip_reason()?;
                ctx.skip(SkippedEntity::new(EntityKind::Genre, genre, reason));
                return Ok(());
            }
        };

        let mut new_artists = 0;
        for artist in artists {
            let id = artist.id.clone();
            // A known artist only gains the genre; its units were queued
            // when it was first seen.
            if !ctx.state.ledger.record_artist(artist.with_genre(genre)).is_new {
                continue;
            }
            new_artists += 1;
            ctx.state
                .frontier
                .push(WorkUnit::RelatedExpansion(id.clone()));
            ctx.state.frontier.push(WorkUnit::AlbumFetch(id));
        }
        log::debug!("Genre \"{}\": {} new artists", genre, new_artists);
        Ok(())
    }

    async fn expand_related(&self, artist_id: &str, ctx: &mut RunContext) -> Result<(), Interrupt> {
        let label = format!("related artists of {}", artist_id);
        let related = match ctx
            .governor
            .call(CallKind::Catalog, &label, || {
                self.catalog.related_artists(artist_id)
            })
            .await
        {
            Ok(related) => related,
            Err(escalation) => {
                let reason = escalation.skip_reason()?;
                ctx.skip(SkippedEntity::new(EntityKind::Artist, artist_id, reason));
                return Ok(());
            }
        };

        let mut new_artists = 0;
        for artist in related {
            let id = artist.id.clone();
            if ctx.state.ledger.record_artist(artist).is_new {
                new_artists += 1;
            }
            ctx.state.frontier.push(WorkUnit::AlbumFetch(id));
        }
        log::debug!("Related of {}: {} new artists", artist_id, new_artists);
        Ok(())
    }

    async fn fetch_albums<F: AssetFetcher>(
        &self,
        artist_id: &str,
        ctx: &mut RunContext,
        materializer: &mut Materializer<'_, F>,
    ) -> Result<(), Interrupt> {
        if let Err(e) = validate_path_component(artist_id) {
            ctx.skip(SkippedEntity::new(EntityKind::Artist, artist_id, e.to_string()));
            return Ok(());
        }

        let label = format!("albums of {}", artist_id);
        let summaries = match ctx
            .governor
            .call(CallKind::Catalog, &label, || {
                self.catalog.albums_for_artist(artist_id)
            })
            .await
        {
            Ok(summaries) => summaries,
            Err(escalation) => {
                let reason = escalation.skip_reason()?;
                ctx.skip(SkippedEntity::new(EntityKind::Artist, artist_id, reason));
                return Ok(());
            }
        };

        for summary in summaries {
            // Owned by whichever artist listed it first
            if ctx.state.ledger.has_album(&summary.id) {
                continue;
            }
            if let Err(e) = validate_path_component(&summary.id) {
                ctx.skip(SkippedEntity::new(EntityKind::Album, &summary.id, e.to_string()));
                continue;
            }

            let label = format!("cover urls of {}", summary.id);
            let urls = match ctx
                .governor
                .call(CallKind::Catalog, &label, || {
                    self.catalog.cover_image_urls(&summary.id)
                })
                .await
            {
                Ok(urls) => urls,
                Err(escalation) => {
                    let reason = escalation.skip_reason()?;
                    ctx.skip(SkippedEntity::new(EntityKind::Album, &summary.id, reason));
                    continue;
                }
            };
            let Some((large, small)) = urls.both() else {
                ctx.skip(SkippedEntity::new(
                    EntityKind::Album,
                    &summary.id,
                    "no cover art",
                ));
                continue;
            };

            let album = Album::from_summary(summary, artist_id, large, small);
            ctx.state.ledger.record_album(album.clone());
            materializer.materialize(&album, ctx).await?;
        }
        Ok(())
    }
}
