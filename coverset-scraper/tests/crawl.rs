mod common;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use coverset_core::{CoverSize, EntityKind, WorkUnit};
use coverset_lib::AssetLayout;
use coverset_lib::dataset::{TABLE_FILE, read_records};
use coverset_scraper::{CatalogError, CrawlError, CrawlEvent, CrawlStatus};

use common::*;

fn owned(rows: &[(&str, &str)]) -> Vec<(String, String)> {
    rows.iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn scenario_materializes_seeds_and_related() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();

    let outcome = run(&catalog, &options(dir.path(), &["thrash-metal"])).await;

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(
        rows(dir.path()),
        owned(&[
            ("Slayer", "Reign in Blood"),
            ("Metallica", "Master of Puppets"),
            ("Exodus", "Bonded by Blood"),
            ("Megadeth", "Peace Sells... but Who's Buying?"),
        ])
    );

    let state = checkpoint(dir.path());
    assert_eq!(state.ledger.artist_count(), 4);
    assert_eq!(state.ledger.album_count(), 4);
    assert_eq!(state.ledger.materialized_count(), 4);
    assert_eq!(state.records_written, 4);
    // one seed, two expansions, four album fetches
    assert_eq!(state.units_completed, 7);
    assert!(state.frontier.is_done());

    let layout = AssetLayout::new(dir.path());
    for (artist, album) in [
        ("slayer", "reign"),
        ("metallica", "puppets"),
        ("exodus", "bonded"),
        ("megadeth", "peace"),
    ] {
        assert!(layout.is_complete(artist, album), "{album} covers missing");
    }
}

#[tokio::test(start_paused = true)]
async fn rows_carry_genre_date_and_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    run(&catalog, &options(dir.path(), &["thrash-metal"])).await;

    let records = read_records(&dir.path().join(TABLE_FILE)).unwrap();
    let reign = &records[0];
    assert_eq!(reign.genre, "thrash-metal");
    assert_eq!(reign.release_date, "1986-10-07");
    assert_eq!(reign.cover_path_large, "covers/slayer/reign_300.jpg");
    assert_eq!(reign.cover_path_small, "covers/slayer/reign_64.jpg");

    // Related artists have no seed genre; the catalog's own tag is used
    let bonded = &records[2];
    assert_eq!(bonded.genre, "bay area thrash");

    let on_disk = std::fs::read(dir.path().join(&reign.cover_path_large)).unwrap();
    assert_eq!(
        on_disk,
        format!("jpeg:{}", cover_url("reign", CoverSize::Large)).into_bytes()
    );
}

#[tokio::test(start_paused = true)]
async fn second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let opts = options(dir.path(), &["thrash-metal"]);

    run(&catalog, &opts).await;
    let calls = catalog.calls().len();
    let table = table_bytes(dir.path());
    let snapshot = checkpoint_bytes(dir.path());

    let outcome = run(&catalog, &opts).await;

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(catalog.calls().len(), calls);
    assert_eq!(table_bytes(dir.path()), table);
    assert_eq!(checkpoint_bytes(dir.path()), snapshot);
}

#[tokio::test(start_paused = true)]
async fn identical_inputs_give_identical_outputs() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();

    run(&thrash_scenario(), &options(a.path(), &["thrash-metal"])).await;
    run(&thrash_scenario(), &options(b.path(), &["thrash-metal"])).await;

    assert_eq!(table_bytes(a.path()), table_bytes(b.path()));
    assert_eq!(checkpoint_bytes(a.path()), checkpoint_bytes(b.path()));
}

#[tokio::test(start_paused = true)]
async fn limited_runs_resume_to_the_uninterrupted_result() {
    let reference = tempfile::tempdir().unwrap();
    run(&thrash_scenario(), &options(reference.path(), &["thrash-metal"])).await;

    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let mut opts = options(dir.path(), &["thrash-metal"]);
    opts.max_units = Some(2);

    let mut runs = 0;
    loop {
        runs += 1;
        assert!(runs < 10, "crawl never finished");
        let outcome = run(&catalog, &opts).await;
        if outcome.status == CrawlStatus::Completed {
            break;
        }
        assert_eq!(outcome.status, CrawlStatus::UnitLimitReached);
    }

    assert_eq!(runs, 4);
    assert_eq!(table_bytes(dir.path()), table_bytes(reference.path()));
    assert_eq!(checkpoint_bytes(dir.path()), checkpoint_bytes(reference.path()));
    // No committed unit is ever redone
    assert_eq!(catalog.count("albums:slayer"), 1);
    assert_eq!(catalog.count("top:thrash-metal"), 1);
}

#[tokio::test(start_paused = true)]
async fn long_rate_limit_stops_and_uncommitted_rows_are_dropped() {
    let scenario = || thrash_scenario().album("metallica", "justice", "...And Justice for All", "1988-08-25");

    let reference = tempfile::tempdir().unwrap();
    run(&scenario(), &options(reference.path(), &["thrash-metal"])).await;

    let dir = tempfile::tempdir().unwrap();
    let catalog = scenario();
    catalog.fail(
        "covers:justice",
        CatalogError::RateLimited {
            retry_after: Duration::from_secs(3600),
        },
    );
    let opts = options(dir.path(), &["thrash-metal"]);

    let outcome = run(&catalog, &opts).await;
    assert_eq!(
        outcome.status,
        CrawlStatus::RateLimited {
            retry_after: Duration::from_secs(3600)
        }
    );
    // "Master of Puppets" was appended by the interrupted unit but not committed
    assert_eq!(read_records(&dir.path().join(TABLE_FILE)).unwrap().len(), 2);
    let state = checkpoint(dir.path());
    assert_eq!(state.records_written, 1);
    assert_eq!(
        state.frontier.peek(),
        Some(&WorkUnit::AlbumFetch("metallica".into()))
    );

    let outcome = run(&catalog, &opts).await;
    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(table_bytes(dir.path()), table_bytes(reference.path()));
    assert_eq!(checkpoint_bytes(dir.path()), checkpoint_bytes(reference.path()));
    // Covers written before the stop are reused
    assert_eq!(
        catalog.count(&format!("image:{}", cover_url("puppets", CoverSize::Large))),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn short_rate_limit_is_waited_out_on_the_same_call() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    catalog.fail(
        "related:slayer",
        CatalogError::RateLimited {
            retry_after: Duration::from_secs(5),
        },
    );

    let start = tokio::time::Instant::now();
    let outcome = run(&catalog, &options(dir.path(), &["thrash-metal"])).await;

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(outcome.calls.rate_limit_waits, 1);

    let calls = catalog.calls();
    let first = calls.iter().position(|c| c == "related:slayer").unwrap();
    assert_eq!(calls[first + 1], "related:slayer");
    assert_eq!(catalog.count("related:slayer"), 2);
    assert_eq!(rows(dir.path()).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    catalog.fail_times("albums:exodus", 2, || {
        CatalogError::ServerError {
            status: 503,
            message: "unavailable".into(),
        }
    });

    let outcome = run(&catalog, &options(dir.path(), &["thrash-metal"])).await;

    assert_eq!(outcome.calls.retries, 2);
    assert_eq!(catalog.count("albums:exodus"), 3);
    assert_eq!(rows(dir.path()).len(), 4);
    assert!(checkpoint(dir.path()).skipped.is_empty());
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_skips_the_entity_for_good() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    catalog.fail("albums:exodus", CatalogError::NotFound("exodus".into()));
    let opts = options(dir.path(), &["thrash-metal"]);

    let outcome = run(&catalog, &opts).await;

    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(rows(dir.path()).len(), 3);
    let state = checkpoint(dir.path());
    assert_eq!(state.skipped.len(), 1);
    assert_eq!(state.skipped[0].kind, EntityKind::Artist);
    assert_eq!(state.skipped[0].id, "exodus");
    assert!(state.frontier.albums_fetched("exodus"));

    run(&catalog, &opts).await;
    assert_eq!(catalog.count("albums:exodus"), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_aborts_and_the_next_run_resumes() {
    let reference = tempfile::tempdir().unwrap();
    run(&thrash_scenario(), &options(reference.path(), &["thrash-metal"])).await;

    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    catalog.fail(
        "related:metallica",
        CatalogError::InvalidCredentials("token revoked".into()),
    );
    let opts = options(dir.path(), &["thrash-metal"]);

    let result = try_run(&catalog, &opts).await;
    assert!(matches!(result, Err(CrawlError::Fatal(_))));

    run(&catalog, &opts).await;
    assert_eq!(table_bytes(dir.path()), table_bytes(reference.path()));
}

#[tokio::test(start_paused = true)]
async fn artists_are_deduplicated_and_seed_genres_unioned() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ScriptedCatalog::new()
        .genre("thrash-metal", &[("slayer", "Slayer")])
        .genre("doom-metal", &[("candlemass", "Candlemass")])
        .genre("speed-metal", &[("slayer", "Slayer")])
        .related("candlemass", "thrash metal", &[("slayer", "Slayer")])
        .album("slayer", "reign", "Reign in Blood", "1986-10-07")
        .album("candlemass", "epicus", "Epicus Doomicus Metallicus", "1986-06-10");

    run(
        &catalog,
        &options(dir.path(), &["thrash-metal", "doom-metal", "speed-metal"]),
    )
    .await;

    let state = checkpoint(dir.path());
    assert_eq!(state.ledger.artist_count(), 2);
    let slayer = state.ledger.artist("slayer").unwrap();
    // Reaching Slayer through Candlemass adds no genre
    assert_eq!(
        slayer.genres.iter().cloned().collect::<Vec<_>>(),
        vec!["speed-metal".to_string(), "thrash-metal".to_string()]
    );
    assert_eq!(catalog.count("albums:slayer"), 1);
    assert_eq!(catalog.count("related:slayer"), 1);

    let records = read_records(&dir.path().join(TABLE_FILE)).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].genre, "speed-metal;thrash-metal");
}

#[tokio::test(start_paused = true)]
async fn related_artist_seeded_later_is_not_expanded() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ScriptedCatalog::new()
        .genre("thrash-metal", &[("slayer", "Slayer")])
        .genre("doom-metal", &[("exodus", "Exodus")])
        .related("slayer", "bay area thrash", &[("exodus", "Exodus")])
        .related("exodus", "teutonic thrash", &[("kreator", "Kreator")])
        .album("slayer", "reign", "Reign in Blood", "1986-10-07")
        .album("exodus", "bonded", "Bonded by Blood", "1985-04-25")
        .album("kreator", "pleasure", "Pleasure to Kill", "1986-11-01");

    // Exodus is reached through Slayer before doom-metal is ever seeded
    run(&catalog, &options(dir.path(), &["thrash-metal"])).await;
    run(&catalog, &options(dir.path(), &["thrash-metal", "doom-metal"])).await;

    let state = checkpoint(dir.path());
    assert_eq!(catalog.count("top:doom-metal"), 1);
    assert_eq!(catalog.count("related:exodus"), 0);
    assert_eq!(catalog.count("albums:exodus"), 1);
    assert_eq!(state.ledger.artist_count(), 2);
    assert!(state.ledger.artist("kreator").is_none());
    // The later seed still contributes its genre
    let exodus = state.ledger.artist("exodus").unwrap();
    assert!(exodus.genres.contains("doom-metal"));
    assert_eq!(
        rows(dir.path()),
        owned(&[("Slayer", "Reign in Blood"), ("Exodus", "Bonded by Blood")])
    );
}

#[tokio::test(start_paused = true)]
async fn album_listed_by_two_artists_is_owned_by_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ScriptedCatalog::new()
        .genre("thrash-metal", &[("slayer", "Slayer"), ("anthrax", "Anthrax")])
        .album("slayer", "split", "Big Four Split", "2010-10-29")
        .album("anthrax", "split", "Big Four Split", "2010-10-29");

    run(&catalog, &options(dir.path(), &["thrash-metal"])).await;

    assert_eq!(rows(dir.path()), owned(&[("Slayer", "Big Four Split")]));
    assert_eq!(catalog.count("covers:split"), 1);
}

#[tokio::test(start_paused = true)]
async fn partial_download_is_not_materialized_until_complete() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let large = cover_url("reign", CoverSize::Large);
    let small = cover_url("reign", CoverSize::Small);
    catalog.fail(&format!("image:{}", large), CatalogError::NotFound(large.clone()));
    let opts = options(dir.path(), &["thrash-metal"]);

    run(&catalog, &opts).await;

    let layout = AssetLayout::new(dir.path());
    assert!(layout.is_present("slayer", "reign", CoverSize::Small));
    assert!(!layout.is_present("slayer", "reign", CoverSize::Large));
    assert!(!rows(dir.path()).iter().any(|(_, album)| album == "Reign in Blood"));

    let state = checkpoint(dir.path());
    assert!(!state.ledger.is_materialized("reign"));
    assert_eq!(state.asset_retries.len(), 1);
    assert_eq!(state.asset_retries[0].album.id, "reign");
    assert_eq!(state.asset_retries[0].attempts, 1);

    // The next run fetches only the missing size, from the stored URL
    let covers_calls = catalog.count("covers:reign");
    run(&catalog, &opts).await;

    assert_eq!(catalog.count(&format!("image:{}", small)), 1);
    assert_eq!(catalog.count(&format!("image:{}", large)), 2);
    assert_eq!(catalog.count("covers:reign"), covers_calls);
    let state = checkpoint(dir.path());
    assert!(state.asset_retries.is_empty());
    assert!(state.ledger.is_materialized("reign"));
    assert_eq!(rows(dir.path()).len(), 4);
    assert_eq!(rows(dir.path())[3].1, "Reign in Blood");
}

#[tokio::test(start_paused = true)]
async fn repeated_download_failures_give_up() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let large = cover_url("reign", CoverSize::Large);
    catalog.fail_times(&format!("image:{}", large), 5, || {
        CatalogError::NotFound("gone".into())
    });
    let mut opts = options(dir.path(), &["thrash-metal"]);
    opts.settings.max_asset_retries = 2;

    run(&catalog, &opts).await;
    assert_eq!(checkpoint(dir.path()).asset_retries.len(), 1);

    run(&catalog, &opts).await;
    let state = checkpoint(dir.path());
    assert!(state.asset_retries.is_empty());
    assert_eq!(state.skipped.len(), 1);
    assert_eq!(state.skipped[0].id, "reign");

    run(&catalog, &opts).await;
    assert_eq!(catalog.count(&format!("image:{}", large)), 2);
    assert_eq!(rows(dir.path()).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn album_without_artwork_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario().album_without_covers("slayer", "demo", "Demo Tape", "1983");

    run(&catalog, &options(dir.path(), &["thrash-metal"])).await;

    let state = checkpoint(dir.path());
    assert!(!state.ledger.has_album("demo"));
    assert_eq!(state.skipped[0].reason, "no cover art");
    assert_eq!(rows(dir.path()).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn table_without_checkpoint_needs_restart() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let mut opts = options(dir.path(), &["thrash-metal"]);
    run(&catalog, &opts).await;
    let images = catalog.calls().iter().filter(|c| c.starts_with("image:")).count();

    std::fs::remove_file(coverset_lib::CheckpointStore::in_dir(dir.path()).path()).unwrap();
    assert!(matches!(
        try_run(&catalog, &opts).await,
        Err(CrawlError::Config(_))
    ));

    opts.restart = true;
    let outcome = run(&catalog, &opts).await;
    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(rows(dir.path()).len(), 4);
    // Cover files survive a restart
    let images_after = catalog.calls().iter().filter(|c| c.starts_with("image:")).count();
    assert_eq!(images_after, images);
}

#[tokio::test(start_paused = true)]
async fn new_genres_are_appended_on_resume() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario()
        .genre("doom-metal", &[("candlemass", "Candlemass")])
        .album("candlemass", "epicus", "Epicus Doomicus Metallicus", "1986-06-10");

    run(&catalog, &options(dir.path(), &["thrash-metal"])).await;
    run(&catalog, &options(dir.path(), &["thrash-metal", "doom-metal"])).await;

    assert_eq!(catalog.count("top:thrash-metal"), 1);
    assert_eq!(catalog.count("top:doom-metal"), 1);
    assert_eq!(rows(dir.path()).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn stop_flag_is_honoured_between_units() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let opts = options(dir.path(), &["thrash-metal"]);

    let (outcome, _) = run_with_events(&catalog, &opts, &AtomicBool::new(true)).await;
    assert_eq!(outcome.status, CrawlStatus::StopRequested);
    assert!(catalog.calls().is_empty());
    assert_eq!(checkpoint(dir.path()).units_completed, 0);

    let (outcome, _) = run_with_events(&catalog, &opts, &AtomicBool::new(false)).await;
    assert_eq!(outcome.status, CrawlStatus::Completed);
    assert_eq!(rows(dir.path()).len(), 4);
}

#[tokio::test(start_paused = true)]
async fn progress_events_follow_summary_interval() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = thrash_scenario();
    let mut opts = options(dir.path(), &["thrash-metal"]);
    opts.settings.summary_every = 3;

    let (outcome, events) = run_with_events(&catalog, &opts, &AtomicBool::new(false)).await;

    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Progress(s) => Some(s.units_completed),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![3, 6]);
    assert!(matches!(events.first(), Some(CrawlEvent::Started { queued: 1 })));
    assert!(matches!(
        events.last(),
        Some(CrawlEvent::Finished {
            status: CrawlStatus::Completed,
            ..
        })
    ));
    let materialized = events
        .iter()
        .filter(|e| matches!(e, CrawlEvent::AlbumMaterialized { .. }))
        .count();
    assert_eq!(materialized, 4);
    assert_eq!(outcome.summary.records_written, 4);
    assert!(dir.path().join("crawl-log.txt").exists());
}
