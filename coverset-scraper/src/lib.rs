pub mod catalog;
pub mod client;
pub mod crawl;
pub mod credentials;
pub mod error;
pub mod governor;
pub mod log;
pub mod materialize;
pub mod traversal;
pub mod types;

pub use catalog::{AssetFetcher, CatalogClient};
pub use client::SpotifyClient;
pub use crawl::{CrawlEvent, CrawlOptions, CrawlOutcome, CrawlStatus, RunContext, crawl};
pub use credentials::{CredentialSource, CredentialSources, Credentials, credential_sources};
pub use error::{CatalogError, CrawlError, FailureClass, Interrupt};
pub use governor::{CallKind, CallOutcome, Decision, Escalation, Governor, GovernorStats, RetryPolicy};
pub use log::{CrawlLog, LogEntry, LogSummary};
pub use materialize::{MaterializeOutcome, Materializer};
pub use traversal::Traversal;
