//! Note model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::error::{Error, Result};
use crate::store::Entity;

/// A free-form note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a note
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteDraft {
    /// Externally supplied id (remote-origin creation)
    pub id: Option<EntityId>,
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Partial update of a note
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl Note {
    /// First line of the content, truncated to `max_len` characters
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

impl Entity for Note {
    type Draft = NoteDraft;
    type Patch = NotePatch;

    const KIND: &'static str = "notes";

    fn build(draft: NoteDraft, now: DateTime<Utc>) -> Result<Self> {
        let title = draft.title.trim();
        if title.is_empty() && draft.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "note needs a title or some content".into(),
            ));
        }

        Ok(Self {
            id: draft.id.unwrap_or_else(EntityId::generate),
            title: title.to_string(),
            content: draft.content,
            completed: false,
            created_at: now,
            updated_at: now,
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn apply(&mut self, patch: NotePatch, _now: DateTime<Utc>) -> Result<()> {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        Ok(())
    }

    fn authoritative_patch(&self) -> NotePatch {
        NotePatch {
            title: Some(self.title.clone()),
            content: Some(self.content.clone()),
            completed: Some(self.completed),
        }
    }
}
