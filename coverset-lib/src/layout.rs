//! Cover asset directory layout.
//!
//! ```text
//! {output}/covers/{artist_id}/{album_id}_300.jpg
//! {output}/covers/{artist_id}/{album_id}_64.jpg
//! ```
//!
//! Paths are a pure function of `(artist_id, album_id, size)`, so two albums
//! can never share a file and a rerun finds what an earlier run wrote.

use std::path::{Path, PathBuf};

use coverset_core::{CoverSize, validate_path_component};

use crate::error::StorageError;
use crate::fs::{atomic_write, is_non_empty_file};

/// Directory under the output root holding all cover assets.
pub const COVERS_DIR: &str = "covers";

#[derive(Debug, Clone)]
pub struct AssetLayout {
    root: PathBuf,
}

impl AssetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path relative to the output root, always `/`-separated. This is what
    /// goes into the dataset table.
    pub fn relative_path(
        &self,
        artist_id: &str,
        album_id: &str,
        size: CoverSize,
    ) -> Result<String, StorageError> {
        let artist = validate_path_component(artist_id)?;
        let album = validate_path_component(album_id)?;
        Ok(format!(
            "{}/{}/{}_{}.jpg",
            COVERS_DIR,
            artist,
            album,
            size.pixels()
        ))
    }

    pub fn path(
        &self,
        artist_id: &str,
        album_id: &str,
        size: CoverSize,
    ) -> Result<PathBuf, StorageError> {
        let artist = validate_path_component(artist_id)?;
        let album = validate_path_component(album_id)?;
        Ok(self
            .root
            .join(COVERS_DIR)
            .join(artist)
            .join(format!("{}_{}.jpg", album, size.pixels())))
    }

    /// True if this size of the cover is on disk and non-empty.
    pub fn is_present(&self, artist_id: &str, album_id: &str, size: CoverSize) -> bool {
        self.path(artist_id, album_id, size)
            .is_ok_and(|p| is_non_empty_file(&p))
    }

    /// True if both sizes are on disk and non-empty.
    pub fn is_complete(&self, artist_id: &str, album_id: &str) -> bool {
        CoverSize::ALL
            .iter()
            .all(|&size| self.is_present(artist_id, album_id, size))
    }

    /// Write one cover image atomically.
    pub fn write(
        &self,
        artist_id: &str,
        album_id: &str,
        size: CoverSize,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.path(artist_id, album_id, size)?;
        atomic_write(&path, bytes)?;
        Ok(path)
    }
}
