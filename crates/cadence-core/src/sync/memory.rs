//! In-process remote collection

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    RemoteCallback, RemoteCollection, RemoteDocument, RemoteError, RemoteResult,
    RemoteSubscription,
};
use crate::models::EntityId;
use crate::store::Entity;
use crate::time::{system_time, SharedTime};

struct State<E> {
    documents: Vec<RemoteDocument<E>>,
    listeners: HashMap<u64, (String, RemoteCallback<E>)>,
    next_listener: u64,
    offline: bool,
    read_only: bool,
    updates: Vec<(EntityId, serde_json::Value)>,
}

/// Document collection held in memory.
///
/// Behaves like a hosted store: ids and `updatedAt` are assigned by the
/// "server" clock, and subscribers receive the owner's full result set
/// after each write. Can be switched offline to exercise failure paths.
pub struct MemoryRemote<E: Entity> {
    state: Arc<Mutex<State<E>>>,
    time: SharedTime,
    push: bool,
}

impl<E: Entity> MemoryRemote<E> {
    pub fn new(time: SharedTime) -> Arc<Self> {
        Arc::new(Self::build(time, true))
    }

    /// A collection that cannot push changes (callers must poll)
    pub fn without_push(time: SharedTime) -> Arc<Self> {
        Arc::new(Self::build(time, false))
    }

    fn build(time: SharedTime, push: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                documents: Vec::new(),
                listeners: HashMap::new(),
                next_listener: 0,
                offline: false,
                read_only: false,
                updates: Vec::new(),
            })),
            time,
            push,
        }
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Keep serving reads but fail every write
    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    /// Store `entity` verbatim for `user_id`, as another device would
    pub fn seed(&self, user_id: &str, entity: E) {
        let mut state = self.lock();
        state.documents.retain(|doc| doc.entity.id() != entity.id());
        state.documents.push(RemoteDocument {
            user_id: user_id.to_string(),
            entity,
        });
        drop(state);
        self.broadcast(user_id);
    }

    /// Remove a document without going through `delete`
    pub fn remove(&self, id: &EntityId) {
        let owner = {
            let mut state = self.lock();
            let owner = state
                .documents
                .iter()
                .find(|doc| doc.entity.id() == id)
                .map(|doc| doc.user_id.clone());
            state.documents.retain(|doc| doc.entity.id() != id);
            owner
        };
        if let Some(owner) = owner {
            self.broadcast(&owner);
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<E> {
        self.lock()
            .documents
            .iter()
            .find(|doc| doc.entity.id() == id)
            .map(|doc| doc.entity.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().documents.is_empty()
    }

    /// Every partial write received, in order, as JSON bodies
    pub fn updates(&self) -> Vec<(EntityId, serde_json::Value)> {
        self.lock().updates.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_online(&self) -> RemoteResult<()> {
        if self.lock().offline {
            Err(RemoteError::Unavailable("memory remote is offline".into()))
        } else {
            Ok(())
        }
    }

    fn ensure_writable(&self) -> RemoteResult<()> {
        self.ensure_online()?;
        if self.lock().read_only {
            Err(RemoteError::Unavailable("memory remote is read-only".into()))
        } else {
            Ok(())
        }
    }

    fn broadcast(&self, user_id: &str) {
        let (snapshot, callbacks) = {
            let state = self.lock();
            let snapshot = state
                .documents
                .iter()
                .filter(|doc| doc.user_id == user_id)
                .map(|doc| doc.entity.clone())
                .collect::<Vec<_>>();
            let callbacks = state
                .listeners
                .values()
                .filter(|(owner, _)| owner == user_id)
                .map(|(_, callback)| callback.clone())
                .collect::<Vec<_>>();
            (snapshot, callbacks)
        };
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }
}

#[async_trait]
impl<E: Entity> RemoteCollection<E> for MemoryRemote<E> {
    async fn fetch_all(&self, user_id: &str) -> RemoteResult<Vec<E>> {
        self.ensure_online()?;
        Ok(self
            .lock()
            .documents
            .iter()
            .filter(|doc| doc.user_id == user_id)
            .map(|doc| doc.entity.clone())
            .collect())
    }

    async fn create(&self, user_id: &str, entity: &E) -> RemoteResult<EntityId> {
        self.ensure_writable()?;
        let now = self.time.now();
        let id = EntityId::generate();
        let mut stored = entity.clone().with_id(id.clone());
        stored.stamp(now, now);
        self.lock().documents.push(RemoteDocument {
            user_id: user_id.to_string(),
            entity: stored,
        });
        self.broadcast(user_id);
        Ok(id)
    }

    async fn update(&self, id: &EntityId, patch: &E::Patch) -> RemoteResult<()> {
        self.ensure_writable()?;
        let body = serde_json::to_value(patch)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        let now = self.time.now();
        let owner = {
            let mut state = self.lock();
            let document = state
                .documents
                .iter_mut()
                .find(|doc| doc.entity.id() == id)
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
            document
                .entity
                .apply(patch.clone(), now)
                .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
            let created_at = document.entity.created_at();
            document.entity.stamp(created_at, now);
            let owner = document.user_id.clone();
            state.updates.push((id.clone(), body));
            owner
        };
        self.broadcast(&owner);
        Ok(())
    }

    async fn delete(&self, id: &EntityId) -> RemoteResult<()> {
        self.ensure_writable()?;
        let owner = {
            let mut state = self.lock();
            let position = state
                .documents
                .iter()
                .position(|doc| doc.entity.id() == id)
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
            state.documents.remove(position).user_id
        };
        self.broadcast(&owner);
        Ok(())
    }

    fn subscribe(&self, user_id: &str, callback: RemoteCallback<E>) -> Option<RemoteSubscription> {
        if !self.push {
            return None;
        }
        let id = {
            let mut state = self.lock();
            let id = state.next_listener;
            state.next_listener += 1;
            state.listeners.insert(id, (user_id.to_string(), callback));
            id
        };
        let state = Arc::downgrade(&self.state);
        Some(RemoteSubscription::new(move || {
            if let Some(state) = state.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .listeners
                    .remove(&id);
            }
        }))
    }
}

impl<E: Entity> Default for MemoryRemote<E> {
    fn default() -> Self {
        Self::build(system_time(), true)
    }
}
