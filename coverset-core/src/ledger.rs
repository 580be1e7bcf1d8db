//! Identity and deduplication ledger.
//!
//! Artists and albums are keyed by catalog id. Re-recording an artist merges
//! into the existing entry (first sighting keeps its attributes, provenance
//! genres are unioned); re-recording an album is a no-op. Iteration follows
//! discovery order so serialized snapshots are stable across runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Album, Artist};

/// An album together with its materialization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumEntry {
    pub album: Album,
    #[serde(default)]
    pub materialized: bool,
}

/// Result of recording an entity: the ledger's view after the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recorded<'a, T> {
    /// True when the id was not in the ledger before this call.
    pub is_new: bool,
    pub entity: &'a T,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    artists: HashMap<String, Artist>,
    artist_order: Vec<String>,
    albums: HashMap<String, AlbumEntry>,
    album_order: Vec<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_artist(&self, id: &str) -> bool {
        self.artists.contains_key(id)
    }

    pub fn has_album(&self, id: &str) -> bool {
        self.albums.contains_key(id)
    }

    pub fn artist(&self, id: &str) -> Option<&Artist> {
        self.artists.get(id)
    }

    pub fn album(&self, id: &str) -> Option<&AlbumEntry> {
        self.albums.get(id)
    }

    /// Insert an artist or merge it into the existing entry.
    ///
    /// An existing entry keeps its name and catalog genres; only the
    /// provenance genre set grows.
    pub fn record_artist(&mut self, artist: Artist) -> Recorded<'_, Artist> {
        let is_new = !self.artists.contains_key(&artist.id);
        let id = artist.id.clone();
        if is_new {
            self.artist_order.push(id.clone());
            self.artists.insert(id.clone(), artist);
        } else if let Some(existing) = self.artists.get_mut(&id) {
            existing.genres.extend(artist.genres);
        }
        Recorded {
            is_new,
            entity: &self.artists[&id],
        }
    }

    /// Insert an album. Recording a known album id changes nothing.
    pub fn record_album(&mut self, album: Album) -> Recorded<'_, Album> {
        let is_new = !self.albums.contains_key(&album.id);
        let id = album.id.clone();
        if is_new {
            self.album_order.push(id.clone());
            self.albums.insert(
                id.clone(),
                AlbumEntry {
                    album,
                    materialized: false,
                },
            );
        }
        Recorded {
            is_new,
            entity: &self.albums[&id].album,
        }
    }

    /// Flag an album as having its cover pair on disk and its row written.
    /// Returns false if the album is unknown.
    pub fn mark_materialized(&mut self, album_id: &str) -> bool {
        match self.albums.get_mut(album_id) {
            Some(entry) => {
                entry.materialized = true;
                true
            }
            None => false,
        }
    }

    pub fn is_materialized(&self, album_id: &str) -> bool {
        self.albums.get(album_id).is_some_and(|e| e.materialized)
    }

    /// All artists in discovery order.
    pub fn artists(&self) -> impl Iterator<Item = &Artist> {
        self.artist_order.iter().map(|id| &self.artists[id])
    }

    /// All albums in discovery order.
    pub fn albums(&self) -> impl Iterator<Item = &AlbumEntry> {
        self.album_order.iter().map(|id| &self.albums[id])
    }

    pub fn artist_count(&self) -> usize {
        self.artist_order.len()
    }

    pub fn album_count(&self) -> usize {
        self.album_order.len()
    }

    pub fn materialized_count(&self) -> usize {
        self.albums.values().filter(|e| e.materialized).count()
    }
}

/// Serialized form: entries as ordered lists so the order survives a round trip.
#[derive(Deserialize)]
struct LedgerSnapshot {
    artists: Vec<Artist>,
    albums: Vec<AlbumEntry>,
}

impl Serialize for Ledger {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            artists: Vec<&'a Artist>,
            albums: Vec<&'a AlbumEntry>,
        }
        Borrowed {
            artists: self.artists().collect(),
            albums: self.albums().collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ledger {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let snapshot = LedgerSnapshot::deserialize(deserializer)?;
        let mut ledger = Ledger::new();
        for artist in snapshot.artists {
            ledger.record_artist(artist);
        }
        for entry in snapshot.albums {
            let id = entry.album.id.clone();
            ledger.record_album(entry.album);
            if entry.materialized {
                ledger.mark_materialized(&id);
            }
        }
        Ok(ledger)
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
