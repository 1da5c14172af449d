//! Local/remote synchronization.
//!
//! The remote store is a document collection scoped by user id, reached
//! through [`RemoteCollection`]. [`SyncEngine`] reconciles it with a
//! [`LocalStore`](crate::store::LocalStore) and mirrors local mutations.

mod engine;
mod http;
mod ledger;
mod memory;
mod merge;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::EntityId;
use crate::store::Entity;

pub use engine::SyncEngine;
pub use http::HttpRemoteCollection;
pub use ledger::RemoteLedger;
pub use memory::MemoryRemote;
pub use merge::{plan_merge, MergeAction, MergeReport};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Remote document not found: {0}")]
    NotFound(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// An entity as stored remotely, tagged with its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument<E> {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(flatten)]
    pub entity: E,
}

/// Receives the full remote result set for a user after every change
pub type RemoteCallback<E> = Arc<dyn Fn(Vec<E>) + Send + Sync>;

/// Live subscription handle; dropping it does not cancel
#[must_use = "call unsubscribe() to stop receiving remote changes"]
pub struct RemoteSubscription {
    cancel: Box<dyn FnOnce() + Send>,
}

impl RemoteSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for RemoteSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSubscription").finish_non_exhaustive()
    }
}

/// CRUD + subscribe contract of a per-user remote collection
#[async_trait]
pub trait RemoteCollection<E: Entity>: Send + Sync {
    /// Every document owned by `user_id`, owner tag stripped
    async fn fetch_all(&self, user_id: &str) -> RemoteResult<Vec<E>>;

    /// Store `entity` (its id and timestamps are ignored) and return the
    /// server-assigned id
    async fn create(&self, user_id: &str, entity: &E) -> RemoteResult<EntityId>;

    /// Partial write; the server stamps its own `updatedAt`
    async fn update(&self, id: &EntityId, patch: &E::Patch) -> RemoteResult<()>;

    async fn delete(&self, id: &EntityId) -> RemoteResult<()>;

    /// Push notifications of the user's result set. `None` when the
    /// collection cannot push, in which case callers poll `fetch_all`.
    fn subscribe(&self, _user_id: &str, _callback: RemoteCallback<E>) -> Option<RemoteSubscription> {
        None
    }
}

/// Shared handle to a remote collection
pub type SharedRemote<E> = Arc<dyn RemoteCollection<E>>;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
