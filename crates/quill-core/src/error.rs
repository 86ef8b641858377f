//! Error types for quill-core

use thiserror::Error;

/// Result type alias using quill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation attempted without a resolved user
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether the error came from infrastructure rather than the request itself.
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::LibSql(_) | Self::Io(_) | Self::Storage(_)
        )
    }
}
