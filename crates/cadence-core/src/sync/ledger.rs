//! Persisted set of ids known to exist remotely

use std::collections::BTreeSet;

use crate::models::EntityId;
use crate::store::SnapshotSlot;

/// Ids present in the remote collection as of the last successful sync or
/// mirror write. Stored in the `"<kind>.remote"` slot.
///
/// During a merge, a local entity missing from the remote result set was
/// deleted remotely when its id is in the ledger and was never uploaded
/// when it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLedger {
    key: String,
    ids: BTreeSet<EntityId>,
}

impl RemoteLedger {
    pub fn slot_key(kind: &str) -> String {
        format!("{kind}.remote")
    }

    /// Load the ledger for `kind`. Unreadable ledgers start empty.
    pub fn load(slot: &dyn SnapshotSlot, kind: &str) -> Self {
        let key = Self::slot_key(kind);
        let ids = match slot.read(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|error| {
                tracing::warn!("Failed to parse '{}' ledger, starting empty: {}", key, error);
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(error) => {
                tracing::warn!("Failed to read '{}' ledger: {}", key, error);
                BTreeSet::new()
            }
        };
        Self { key, ids }
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn insert(&mut self, slot: &dyn SnapshotSlot, id: EntityId) {
        if self.ids.insert(id) {
            self.persist(slot);
        }
    }

    pub fn remove(&mut self, slot: &dyn SnapshotSlot, id: &EntityId) {
        if self.ids.remove(id) {
            self.persist(slot);
        }
    }

    /// Replace the whole set
    pub fn replace(&mut self, slot: &dyn SnapshotSlot, ids: impl IntoIterator<Item = EntityId>) {
        self.ids = ids.into_iter().collect();
        self.persist(slot);
    }

    /// Forget every id and drop the slot
    pub fn clear(&mut self, slot: &dyn SnapshotSlot) {
        self.ids.clear();
        if let Err(error) = slot.remove(&self.key) {
            tracing::warn!("Failed to remove '{}' ledger: {}", self.key, error);
        }
    }

    fn persist(&self, slot: &dyn SnapshotSlot) {
        let result = serde_json::to_string(&self.ids)
            .map_err(crate::Error::from)
            .and_then(|raw| slot.write(&self.key, &raw));
        if let Err(error) = result {
            tracing::warn!("Failed to persist '{}' ledger: {}", self.key, error);
        }
    }
}
