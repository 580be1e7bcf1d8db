use thiserror::Error;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Catalog connection or authentication failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] coverset_scraper::CatalogError),

    /// The crawl ended with a run-level error
    #[error("Crawl failed: {0}")]
    Crawl(#[from] coverset_scraper::CrawlError),

    /// Checkpoint or dataset storage error
    #[error("Storage error: {0}")]
    Storage(#[from] coverset_lib::StorageError),
}

impl CliError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Process exit code for this error.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Catalog(_) => 2,
            _ => 1,
        }
    }
}

impl From<coverset_lib::SettingsError> for CliError {
    fn from(e: coverset_lib::SettingsError) -> Self {
        Self::Config(e.to_string())
    }
}
