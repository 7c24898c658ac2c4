//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Failures raised while fetching, indexing or emitting element records.
///
/// Soft access denials (401/403) are not represented here: the client logs
/// them and substitutes an empty data set.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No HTTP response was obtained.
    #[error("{code} - {url}")]
    Transport { code: String, url: String },
    #[error("unexpected status {status} - {url}")]
    UnexpectedStatus { status: u16, url: String },
    #[error("Failed to fetch {path}\nExpected JSON response but received:\n{snippet}...\n")]
    MalformedResponse { path: String, snippet: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejections from a [`crate::store::NodeStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("collection '{0}' has not been declared")]
    UnknownCollection(String),
}
