//! Error types for datastore operations.

use std::fmt;
use std::path::PathBuf;

use objds_store::StoreError;
use thiserror::Error;

/// The datastore operation during which a backend failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Put,
    Get,
    Has,
    GetSize,
    Delete,
    Query,
    EnsureBucket,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Put => "put",
            Self::Get => "get",
            Self::Has => "has",
            Self::GetSize => "get_size",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::EnsureBucket => "ensure_bucket",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Errors returned by the datastore.
#[derive(Debug, Error)]
pub enum DatastoreError {
    /// No value exists at the requested key.
    #[error("datastore: key not found")]
    NotFound,

    /// The query asks for features the object listing cannot provide.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Any other failure reported by the object store.
    #[error("{op} {key}: {source}")]
    Backend {
        op: Operation,
        key: String,
        #[source]
        source: StoreError,
    },

    /// The configuration is incomplete or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The access grant could not be parsed.
    #[error("failed to parse access grant: {0}")]
    ParseAccess(#[source] StoreError),

    /// The project could not be opened with the parsed grant.
    #[error("failed to open project: {0}")]
    OpenProject(#[source] StoreError),

    /// The diagnostic log file could not be opened.
    #[error("failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Flushing the diagnostic sink failed.
    #[error("diagnostics I/O error: {0}")]
    Diagnostics(#[source] std::io::Error),
}

impl DatastoreError {
    /// Returns `true` for the not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` for failures raised while constructing the datastore.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::ParseAccess(_) | Self::OpenProject(_) | Self::LogFile { .. }
        )
    }
}

/// Convenience type alias for datastore operations.
pub type DsResult<T> = std::result::Result<T, DatastoreError>;
