use crate::error::IdError;

/// Check that a catalog id can be used verbatim as a file or directory name.
///
/// Ids end up in `{artist_id}/{album_id}_300.jpg`. Anything that could walk
/// out of the cover directory is rejected, never rewritten, so ids and paths
/// stay one-to-one.
pub fn validate_path_component(id: &str) -> Result<&str, IdError> {
    if id.is_empty() {
        return Err(IdError::Empty);
    }
    let unsafe_char = |c: char| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control();
    if id == "." || id == ".." || id.chars().any(unsafe_char) {
        return Err(IdError::UnsafePath(id.to_string()));
    }
    Ok(id)
}
