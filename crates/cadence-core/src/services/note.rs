//! Note facade

use std::sync::Arc;

use crate::models::{EntityId, Note, NoteDraft, NotePatch};
use crate::store::{LocalStore, Subscription};
use crate::sync::{MergeReport, SyncEngine};
use crate::Result;

/// Thread-safe service for note commands with optional remote write-through
#[derive(Clone)]
pub struct NoteService {
    store: Arc<LocalStore<Note>>,
    sync: Option<SyncEngine<Note>>,
}

impl NoteService {
    pub const fn new(store: Arc<LocalStore<Note>>, sync: Option<SyncEngine<Note>>) -> Self {
        Self { store, sync }
    }

    pub const fn local(store: Arc<LocalStore<Note>>) -> Self {
        Self::new(store, None)
    }

    pub const fn store(&self) -> &Arc<LocalStore<Note>> {
        &self.store
    }

    pub const fn sync_engine(&self) -> Option<&SyncEngine<Note>> {
        self.sync.as_ref()
    }

    pub async fn create(&self, draft: NoteDraft) -> Result<Note> {
        let note = self.store.create(draft)?;
        match &self.sync {
            Some(sync) => Ok(sync.publish_created(note).await),
            None => Ok(note),
        }
    }

    pub async fn update(&self, id: &EntityId, patch: NotePatch) -> Result<Option<Note>> {
        let Some(note) = self.store.update(id, patch.clone())? else {
            return Ok(None);
        };
        if let Some(sync) = &self.sync {
            sync.mirror_update(id, &patch).await;
        }
        Ok(Some(note))
    }

    /// Flip the completed flag
    pub async fn toggle_completed(&self, id: &EntityId) -> Option<Note> {
        let (note, completed) = self.store.modify(id, |note| {
            note.completed = !note.completed;
            Some(note.completed)
        })?;

        if let Some(sync) = &self.sync {
            let patch = NotePatch {
                completed: Some(completed),
                ..NotePatch::default()
            };
            sync.mirror_update(id, &patch).await;
        }
        Some(note)
    }

    pub async fn delete(&self, id: &EntityId) -> bool {
        if !self.store.delete(id) {
            return false;
        }
        if let Some(sync) = &self.sync {
            sync.mirror_delete(id).await;
        }
        true
    }

    pub fn get(&self, id: &EntityId) -> Option<Note> {
        self.store.get_by_id(id)
    }

    pub fn list(&self) -> Vec<Note> {
        self.store.get_all()
    }

    /// Most recently updated first
    pub fn recent(&self, limit: usize) -> Vec<Note> {
        let mut notes = self.list();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes.truncate(limit);
        notes
    }

    /// Case-insensitive match on title or content
    pub fn search(&self, query: &str) -> Vec<Note> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.list()
            .into_iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&needle)
                    || note.content.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    pub async fn sync(&self) -> Option<MergeReport> {
        self.sync.as_ref()?.sync().await
    }
}
