//! Unified error types for sitewatch.
//!
//! Only `InvalidInput` and `DuplicateSite` describe rejected user intent.
//! The storage variants are absorbed by the cache layer and only reach
//! callers of registry mutations.

use tokio_rusqlite::rusqlite;

/// Unified error types for the sitewatch core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input that does not parse as a site URL.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The sanitized URL is already registered.
    #[error("DUPLICATE_SITE: {0}")]
    DuplicateSite(String),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Storage(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORAGE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Persisted payload could not be encoded or decoded.
    #[error("STORAGE_ERROR: malformed payload: {0}")]
    Serialization(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Storage(tokio_rusqlite::Error::Close(c)),
            _ => Error::Storage(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Storage(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    /// Whether this error represents rejected user input rather than an
    /// infrastructure failure.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::DuplicateSite(_))
    }
}
