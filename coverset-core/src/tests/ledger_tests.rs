use super::*;
use crate::model::AlbumSummary;

fn album(id: &str, artist_id: &str) -> Album {
    Album::from_summary(
        AlbumSummary {
            id: id.to_string(),
            name: format!("Album {id}"),
            release_date: "1990-01-01".to_string(),
        },
        artist_id,
        format!("https://i.example/{id}/300"),
        format!("https://i.example/{id}/64"),
    )
}

#[test]
fn test_record_new_artist() {
    let mut ledger = Ledger::new();
    let rec = ledger.record_artist(Artist::new("a1", "Slayer").with_genre("thrash-metal"));
    assert!(rec.is_new);
    assert_eq!(rec.entity.name, "Slayer");
    assert!(ledger.has_artist("a1"));
    assert!(!ledger.has_artist("a2"));
    assert_eq!(ledger.artist_count(), 1);
}

#[test]
fn test_rerecord_unions_genres_and_keeps_first_attributes() {
    let mut ledger = Ledger::new();
    ledger.record_artist(
        Artist::new("a1", "Slayer")
            .with_genre("thrash-metal")
            .with_catalog_genres(vec!["thrash metal".into()]),
    );
    let rec = ledger.record_artist(
        Artist::new("a1", "SLAYER (renamed)")
            .with_genre("doom-metal")
            .with_catalog_genres(vec!["other".into()]),
    );
    assert!(!rec.is_new);
    assert_eq!(rec.entity.name, "Slayer");
    assert_eq!(rec.entity.catalog_genres, vec!["thrash metal".to_string()]);
    let genres: Vec<_> = rec.entity.genres.iter().cloned().collect();
    assert_eq!(genres, vec!["doom-metal", "thrash-metal"]);
    assert_eq!(ledger.artist_count(), 1);
}

#[test]
fn test_relation_sighting_never_removes_genres() {
    let mut ledger = Ledger::new();
    ledger.record_artist(Artist::new("a1", "Slayer").with_genre("thrash-metal"));
    // A related-artist sighting carries no provenance genre
    ledger.record_artist(Artist::new("a1", "Slayer"));
    let artist = ledger.artist("a1").unwrap();
    assert_eq!(artist.genres.len(), 1);
    assert!(artist.genres.contains("thrash-metal"));
}

#[test]
fn test_record_album_is_idempotent() {
    let mut ledger = Ledger::new();
    assert!(ledger.record_album(album("x", "a1")).is_new);
    ledger.mark_materialized("x");

    let mut changed = album("x", "a2");
    changed.name = "Different".into();
    let rec = ledger.record_album(changed);
    assert!(!rec.is_new);
    assert_eq!(rec.entity.artist_id, "a1");
    assert_eq!(rec.entity.name, "Album x");
    assert!(ledger.is_materialized("x"));
    assert_eq!(ledger.album_count(), 1);
}

#[test]
fn test_mark_materialized_unknown_album() {
    let mut ledger = Ledger::new();
    assert!(!ledger.mark_materialized("nope"));
    assert!(!ledger.is_materialized("nope"));
}

#[test]
fn test_iteration_follows_discovery_order() {
    let mut ledger = Ledger::new();
    for id in ["zeta", "alpha", "mid"] {
        ledger.record_artist(Artist::new(id, id));
    }
    ledger.record_artist(Artist::new("alpha", "again"));
    let ids: Vec<_> = ledger.artists().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["zeta", "alpha", "mid"]);

    ledger.record_album(album("b", "zeta"));
    ledger.record_album(album("a", "zeta"));
    let ids: Vec<_> = ledger.albums().map(|e| e.album.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn test_serde_round_trip_preserves_merge_state() {
    let mut ledger = Ledger::new();
    ledger.record_artist(Artist::new("a2", "Candlemass").with_genre("doom-metal"));
    ledger.record_artist(Artist::new("a1", "Slayer").with_genre("thrash-metal"));
    ledger.record_artist(Artist::new("a1", "Slayer").with_genre("doom-metal"));
    ledger.record_album(album("x", "a1"));
    ledger.record_album(album("y", "a2"));
    ledger.mark_materialized("y");

    let json = serde_json::to_string(&ledger).unwrap();
    let restored: Ledger = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, ledger);
    assert_eq!(restored.materialized_count(), 1);
    assert!(restored.is_materialized("y"));
    assert_eq!(restored.artist("a1").unwrap().genres.len(), 2);
    assert_eq!(serde_json::to_string(&restored).unwrap(), json);
}
