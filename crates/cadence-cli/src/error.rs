use std::io;

use cadence_core::sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] cadence_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("{0} ID cannot be empty")]
    EmptyId(&'static str),
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("{kind} not found for id/prefix: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Invalid segment '{0}': expected KIND:DURATION[:LABEL], e.g. focus:25m")]
    InvalidSegment(String),
    #[error("Timer needs --name and at least one --segment, or a --preset")]
    IncompleteTimer,
    #[error("Nothing to change")]
    NothingToChange,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not signed in. Run `cadence auth login --user <ID>` first.")]
    NotSignedIn,
    #[error(
        "Sync is not configured. Run `cadence config init --api-url <URL>` or set CADENCE_API_URL."
    )]
    SyncNotConfigured,
    #[error("Sync failed; see the log for details")]
    SyncFailed,
}
