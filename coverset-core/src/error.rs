use thiserror::Error;

/// Errors raised when a catalog identifier cannot be used as-is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// The identifier is empty
    #[error("empty identifier")]
    Empty,

    /// The identifier would escape its directory when used as a path component
    #[error("identifier {0:?} is not a safe path component")]
    UnsafePath(String),
}
