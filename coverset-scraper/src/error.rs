use std::time::Duration;

use coverset_lib::StorageError;

/// Errors returned by catalog and asset requests.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited by catalog API (retry after {}s)", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Not found in catalog: {0}")]
    NotFound(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Downloaded file is not an image: {0}")]
    NotAnImage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// How the governor should treat a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The service asked us to back off for this long.
    RateLimited(Duration),
    /// Worth retrying after a delay.
    Transient,
    /// Retrying will not help; skip the entity.
    Permanent,
    /// Nothing else will succeed either; stop the run.
    Fatal,
}

impl CatalogError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RateLimited { retry_after } => FailureClass::RateLimited(*retry_after),
            Self::Http(e) => {
                if e.is_decode() || e.is_builder() || e.is_redirect() {
                    FailureClass::Permanent
                } else {
                    // Timeouts, refused connections, truncated bodies
                    FailureClass::Transient
                }
            }
            Self::ServerError { .. } | Self::Network(_) => FailureClass::Transient,
            Self::NotFound(_) | Self::Rejected { .. } | Self::Api(_) | Self::NotAnImage(_) => {
                FailureClass::Permanent
            }
            Self::InvalidCredentials(_) | Self::Config(_) => FailureClass::Fatal,
        }
    }
}

/// Errors that end a crawl run.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fatal catalog error: {0}")]
    Fatal(String),
}

/// Why a work unit stopped before it could be committed.
#[derive(Debug, thiserror::Error)]
pub enum Interrupt {
    /// The service asked for a pause longer than the run is willing to wait.
    #[error("rate limited for {}s, longer than the configured maximum wait", .0.as_secs())]
    RateLimitStop(Duration),

    #[error(transparent)]
    Abort(#[from] CrawlError),
}

impl From<StorageError> for Interrupt {
    fn from(e: StorageError) -> Self {
        Interrupt::Abort(CrawlError::Storage(e))
    }
}
