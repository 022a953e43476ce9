//! Error types for phonebook-core

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias using phonebook-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in phonebook-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Contacts backend error that could not be absorbed by the offline path
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// libSQL error from the durable local store
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Local store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Contact not found
    #[error("Contact not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error came from a transient backend failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(error) if error.is_transient())
    }
}
