//! Error types for cadence-core

use thiserror::Error;

use crate::sync::RemoteError;

/// Result type alias using cadence-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cadence-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error from the snapshot database
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input (caller contract violation)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote collection error
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}
