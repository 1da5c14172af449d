//! Durable snapshot slots.
//!
//! A slot is a named string value in a durable key-value store. Each entity
//! kind owns one slot (e.g. `"timers"`) holding a JSON array of
//! `[id, entity]` pairs with ISO-8601 timestamps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::Entity;
use crate::models::EntityId;
use crate::Result;

/// Durable key-value storage for snapshots
pub trait SnapshotSlot: Send + Sync {
    /// Read the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Drop `key` entirely
    fn remove(&self, key: &str) -> Result<()>;
}

/// Shared handle to a snapshot slot store
pub type SharedSlot = Arc<dyn SnapshotSlot>;

/// Process-local slot store (tests and local-only runs)
#[derive(Debug, Default)]
pub struct MemorySlot {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SnapshotSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// Serialize entities as `[id, entity]` pairs
pub fn encode<E: Entity>(entries: &[E]) -> Result<String> {
    let pairs = entries
        .iter()
        .map(|entity| (entity.id(), entity))
        .collect::<Vec<_>>();
    Ok(serde_json::to_string(&pairs)?)
}

/// Parse `[id, entity]` pairs back into entities, in stored order
pub fn decode<E: Entity>(raw: &str) -> Result<Vec<E>> {
    let pairs = serde_json::from_str::<Vec<(EntityId, E)>>(raw)?;
    Ok(pairs
        .into_iter()
        .map(|(id, entity)| {
            if entity.id() == &id {
                entity
            } else {
                entity.with_id(id)
            }
        })
        .collect())
}

/// Load the snapshot for `E`, starting empty when the slot is missing,
/// unreadable or corrupt.
pub fn load<E: Entity>(slot: &dyn SnapshotSlot, now: DateTime<Utc>) -> Vec<E> {
    let raw = match slot.read(E::KIND) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(error) => {
            tracing::warn!("Failed to read '{}' snapshot: {}", E::KIND, error);
            return Vec::new();
        }
    };

    match decode::<E>(&raw) {
        Ok(entries) => entries
            .into_iter()
            .filter_map(|entity| {
                let id = entity.id().clone();
                entity
                    .validated(now)
                    .map_err(|error| {
                        tracing::warn!(
                            "Dropping invalid {} {} from snapshot: {}",
                            E::KIND,
                            id,
                            error
                        );
                    })
                    .ok()
            })
            .collect(),
        Err(error) => {
            tracing::warn!(
                "Failed to parse '{}' snapshot, starting empty: {}",
                E::KIND,
                error
            );
            Vec::new()
        }
    }
}

/// Write the snapshot for `E`. Failures are logged, never returned.
pub fn persist<E: Entity>(slot: &dyn SnapshotSlot, entries: &[E]) {
    let result = encode(entries).and_then(|raw| slot.write(E::KIND, &raw));
    match result {
        Ok(()) => tracing::debug!("Persisted {} '{}' entries", entries.len(), E::KIND),
        Err(error) => tracing::warn!("Failed to persist '{}' snapshot: {}", E::KIND, error),
    }
}
