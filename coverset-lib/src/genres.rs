//! Genre list input: one genre per line, file order is seeding order.

use std::collections::HashSet;
use std::path::Path;

use crate::error::StorageError;

/// Parse a genre list. Blank lines and `#` comments are ignored; a genre
/// repeated later in the list is dropped.
pub fn parse_genres(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

pub fn load_genres(path: &Path) -> Result<Vec<String>, StorageError> {
    let contents = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    Ok(parse_genres(&contents))
}
