//! The traversal frontier: an ordered queue of pending work units plus the
//! sets of work already done.
//!
//! A unit is never queued twice, and never queued once its target is done:
//! a genre already seeded, an artist already expanded, an artist whose albums
//! were already fetched. The related-artist graph therefore cannot loop.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

/// One pending step of the traversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum WorkUnit {
    /// Fetch the top artists for a genre and register them as seeds.
    GenreSeed(String),
    /// Fetch and register the related artists of an artist.
    RelatedExpansion(String),
    /// Fetch the album list of an artist and materialize new albums.
    AlbumFetch(String),
}

impl WorkUnit {
    /// Genre name or artist id this unit operates on.
    pub fn target(&self) -> &str {
        match self {
            WorkUnit::GenreSeed(t) | WorkUnit::RelatedExpansion(t) | WorkUnit::AlbumFetch(t) => t,
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnit::GenreSeed(g) => write!(f, "seed genre \"{}\"", g),
            WorkUnit::RelatedExpansion(a) => write!(f, "expand related of {}", a),
            WorkUnit::AlbumFetch(a) => write!(f, "fetch albums of {}", a),
        }
    }
}

/// Number of queued units of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCounts {
    pub genre_seeds: usize,
    pub related_expansions: usize,
    pub album_fetches: usize,
}

impl FrontierCounts {
    pub fn total(&self) -> usize {
        self.genre_seeds + self.related_expansions + self.album_fetches
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FrontierSnapshot")]
pub struct Frontier {
    queue: VecDeque<WorkUnit>,
    seeded_genres: BTreeSet<String>,
    expanded: BTreeSet<String>,
    albums_fetched: BTreeSet<String>,
    #[serde(skip)]
    queued: HashSet<WorkUnit>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh frontier holding one seed unit per genre, in list order.
    /// Repeated genres are queued once.
    pub fn from_genres<I, S>(genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frontier = Self::new();
        frontier.extend_genres(genres);
        frontier
    }

    /// Queue seed units for genres that are neither seeded nor queued.
    /// Returns how many were added.
    pub fn extend_genres<I, S>(&mut self, genres: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for genre in genres {
            if self.push(WorkUnit::GenreSeed(genre.into())) {
                added += 1;
            }
        }
        added
    }

    /// Append a unit to the back of the queue.
    ///
    /// Returns false (and queues nothing) if the unit is already queued or
    /// its target has already been processed.
    pub fn push(&mut self, unit: WorkUnit) -> bool {
        if self.queued.contains(&unit) || self.is_completed(&unit) {
            return false;
        }
        self.queued.insert(unit.clone());
        self.queue.push_back(unit);
        true
    }

    /// The next unit to process, without removing it.
    pub fn peek(&self) -> Option<&WorkUnit> {
        self.queue.front()
    }

    /// Remove the front unit and record its target as done.
    pub fn complete_front(&mut self) -> Option<WorkUnit> {
        let unit = self.queue.pop_front()?;
        self.queued.remove(&unit);
        match &unit {
            WorkUnit::GenreSeed(g) => self.seeded_genres.insert(g.clone()),
            WorkUnit::RelatedExpansion(a) => self.expanded.insert(a.clone()),
            WorkUnit::AlbumFetch(a) => self.albums_fetched.insert(a.clone()),
        };
        Some(unit)
    }

    pub fn is_done(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, unit: &WorkUnit) -> bool {
        self.queued.contains(unit)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkUnit> {
        self.queue.iter()
    }

    pub fn is_seeded(&self, genre: &str) -> bool {
        self.seeded_genres.contains(genre)
    }

    pub fn is_expanded(&self, artist_id: &str) -> bool {
        self.expanded.contains(artist_id)
    }

    pub fn albums_fetched(&self, artist_id: &str) -> bool {
        self.albums_fetched.contains(artist_id)
    }

    pub fn counts(&self) -> FrontierCounts {
        let mut counts = FrontierCounts::default();
        for unit in &self.queue {
            match unit {
                WorkUnit::GenreSeed(_) => counts.genre_seeds += 1,
                WorkUnit::RelatedExpansion(_) => counts.related_expansions += 1,
                WorkUnit::AlbumFetch(_) => counts.album_fetches += 1,
            }
        }
        counts
    }

    fn is_completed(&self, unit: &WorkUnit) -> bool {
        match unit {
            WorkUnit::GenreSeed(g) => self.seeded_genres.contains(g),
            WorkUnit::RelatedExpansion(a) => self.expanded.contains(a),
            WorkUnit::AlbumFetch(a) => self.albums_fetched.contains(a),
        }
    }
}

#[derive(Deserialize)]
struct FrontierSnapshot {
    queue: VecDeque<WorkUnit>,
    #[serde(default)]
    seeded_genres: BTreeSet<String>,
    #[serde(default)]
    expanded: BTreeSet<String>,
    #[serde(default)]
    albums_fetched: BTreeSet<String>,
}

impl From<FrontierSnapshot> for Frontier {
    fn from(snapshot: FrontierSnapshot) -> Self {
        let mut frontier = Frontier {
            seeded_genres: snapshot.seeded_genres,
            expanded: snapshot.expanded,
            albums_fetched: snapshot.albums_fetched,
            ..Default::default()
        };
        // Re-pushing drops anything a hand-edited snapshot got wrong
        for unit in snapshot.queue {
            frontier.push(unit);
        }
        frontier
    }
}

#[cfg(test)]
#[path = "tests/frontier_tests.rs"]
mod tests;
