//! Local entity store with durable snapshots and change notification

pub mod snapshot;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::EntityId;
use crate::rehydrate::rehydrate_all;
use crate::time::{system_time, SharedTime};
use crate::{Error, Result};
pub use snapshot::{MemorySlot, SharedSlot, SnapshotSlot};

/// An entity kind held by a [`LocalStore`] and mirrored to a remote collection
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Input for `create`
    type Draft: Send;
    /// Partial update; serialized form is the remote partial-write body
    type Patch: Clone + fmt::Debug + Serialize + Send + Sync;

    /// Snapshot slot name and remote collection name
    const KIND: &'static str;

    /// Validate a draft and fill defaults
    fn build(draft: Self::Draft, now: DateTime<Utc>) -> Result<Self>;

    fn id(&self) -> &EntityId;

    #[must_use]
    fn with_id(self, id: EntityId) -> Self;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>);

    /// Shallow-merge `patch` into `self`
    fn apply(&mut self, patch: Self::Patch, now: DateTime<Utc>) -> Result<()>;

    /// Fields pushed to the remote copy when the local copy wins a merge
    fn authoritative_patch(&self) -> Self::Patch;

    /// Check an entity that arrived whole from outside (a remote fetch or a
    /// snapshot) and clamp its counters into shape
    fn validated(self, _now: DateTime<Utc>) -> Result<Self> {
        Ok(self)
    }

    /// Whether a session is in progress that remote data must not clobber
    fn is_active(&self) -> bool {
        false
    }

    /// Settle time that passed while the snapshot was unloaded. Returns
    /// `true` when the entity is still running afterwards.
    fn rehydrate(&mut self, _now: DateTime<Utc>) -> bool {
        false
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: HashMap<u64, Listener>,
}

/// Handle returned by [`LocalStore::subscribe`]
#[must_use = "keep the subscription and call unsubscribe() to stop notifications"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Stop notifying this listener. Other listeners are unaffected.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Authoritative in-process keeper of every entity of one kind.
///
/// Each notifying mutation writes the whole entity set to the `E::KIND`
/// slot and then calls every listener, outside the lock.
pub struct LocalStore<E: Entity> {
    entries: Mutex<Vec<E>>,
    listeners: Arc<Mutex<Listeners>>,
    slot: SharedSlot,
    time: SharedTime,
}

impl<E: Entity> LocalStore<E> {
    /// Load the `E::KIND` snapshot and rehydrate every loaded entity
    pub fn open(slot: SharedSlot, time: SharedTime) -> Self {
        let now = time.now();
        let mut entries = snapshot::load::<E>(slot.as_ref(), now);
        let report = rehydrate_all(&mut entries, now);
        tracing::debug!(
            "Loaded {} '{}' entries ({} running)",
            report.loaded,
            E::KIND,
            report.running
        );

        Self {
            entries: Mutex::new(entries),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            slot,
            time,
        }
    }

    /// Store backed by process memory and the system clock
    pub fn in_memory() -> Self {
        Self::open(MemorySlot::new(), system_time())
    }

    /// Current time according to the store's time source
    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    pub fn time(&self) -> &SharedTime {
        &self.time
    }

    pub fn slot(&self) -> &SharedSlot {
        &self.slot
    }

    /// Build an entity from `draft` and store it
    pub fn create(&self, draft: E::Draft) -> Result<E> {
        let entity = E::build(draft, self.now())?;
        {
            let mut entries = lock(&self.entries);
            if entries.iter().any(|existing| existing.id() == entity.id()) {
                return Err(Error::InvalidInput(format!(
                    "{} id '{}' already exists",
                    E::KIND,
                    entity.id()
                )));
            }
            entries.push(entity.clone());
            snapshot::persist(self.slot.as_ref(), &entries);
        }
        self.notify();
        Ok(entity)
    }

    /// Store `entity` verbatim, replacing any entry with the same id. The
    /// replaced entry's `created_at` is kept.
    pub fn put(&self, mut entity: E) -> E {
        {
            let mut entries = lock(&self.entries);
            if let Some(existing) = entries.iter_mut().find(|e| e.id() == entity.id()) {
                let updated_at = entity.updated_at();
                entity.stamp(existing.created_at(), updated_at);
                *existing = entity.clone();
            } else {
                entries.push(entity.clone());
            }
            snapshot::persist(self.slot.as_ref(), &entries);
        }
        self.notify();
        entity
    }

    /// Re-file the entry stored under `old_id` under `new_id` (e.g. a
    /// server-assigned id). Fields and timestamps are kept.
    pub fn rekey(&self, old_id: &EntityId, new_id: EntityId) -> Option<E> {
        let rekeyed = {
            let mut entries = lock(&self.entries);
            if entries.iter().any(|e| e.id() == &new_id) {
                tracing::warn!("Cannot rekey '{}' {}: {} already exists", E::KIND, old_id, new_id);
                return None;
            }
            let position = entries.iter().position(|e| e.id() == old_id)?;
            let rekeyed = entries[position].clone().with_id(new_id);
            entries[position] = rekeyed.clone();
            snapshot::persist(self.slot.as_ref(), &entries);
            rekeyed
        };
        self.notify();
        Some(rekeyed)
    }

    pub fn get_by_id(&self, id: &EntityId) -> Option<E> {
        lock(&self.entries).iter().find(|e| e.id() == id).cloned()
    }

    /// All entities in insertion order
    pub fn get_all(&self) -> Vec<E> {
        lock(&self.entries).clone()
    }

    pub fn count(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Shallow-merge `patch` into the entity. `None` if the id is unknown.
    pub fn update(&self, id: &EntityId, patch: E::Patch) -> Result<Option<E>> {
        let now = self.now();
        let updated = self.mutate(id, |entity| entity.apply(patch, now).map(Some))?;
        Ok(updated.map(|(entity, ())| entity))
    }

    /// Run `f` against a copy of the entity and commit the copy when `f`
    /// returns `Some`. `id` and `created_at` are kept and `updated_at`
    /// becomes now.
    pub fn modify<R>(&self, id: &EntityId, f: impl FnOnce(&mut E) -> Option<R>) -> Option<(E, R)> {
        self.mutate(id, |entity| Ok(f(entity))).ok().flatten()
    }

    fn mutate<R>(
        &self,
        id: &EntityId,
        f: impl FnOnce(&mut E) -> Result<Option<R>>,
    ) -> Result<Option<(E, R)>> {
        let now = self.now();
        let committed = {
            let mut entries = lock(&self.entries);
            let Some(existing) = entries.iter_mut().find(|e| e.id() == id) else {
                return Ok(None);
            };
            let created_at = existing.created_at();
            let mut draft = existing.clone();
            let Some(output) = f(&mut draft)? else {
                return Ok(None);
            };
            let mut draft = draft.with_id(id.clone());
            draft.stamp(created_at, now);
            *existing = draft.clone();
            snapshot::persist(self.slot.as_ref(), &entries);
            (draft, output)
        };
        self.notify();
        Ok(Some(committed))
    }

    /// Remove the entity. Persists and notifies only if it existed.
    pub fn delete(&self, id: &EntityId) -> bool {
        {
            let mut entries = lock(&self.entries);
            let before = entries.len();
            entries.retain(|e| e.id() != id);
            if entries.len() == before {
                return false;
            }
            snapshot::persist(self.slot.as_ref(), &entries);
        }
        self.notify();
        true
    }

    /// Remove everything. Always persists and notifies.
    pub fn clear(&self) {
        {
            let mut entries = lock(&self.entries);
            entries.clear();
            snapshot::persist(self.slot.as_ref(), &entries);
        }
        self.notify();
    }

    /// Register a listener called after every notifying mutation
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.insert(id, Arc::new(listener));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    fn notify(&self) {
        let listeners = lock(&self.listeners)
            .entries
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for listener in listeners {
            listener();
        }
    }
}

impl<E: Entity> fmt::Debug for LocalStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore")
            .field("kind", &E::KIND)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Note, NoteDraft, NotePatch, Segment, SegmentKind, Timer, TimerDraft, TimerStatus,
    };
    use crate::time::ManualTime;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn timer_draft(durations: &[u32], repeat_count: u32) -> TimerDraft {
        let segments = durations
            .iter()
            .map(|&d| Segment::new(SegmentKind::Focus, d, "Focus"))
            .collect();
        TimerDraft::new("Deep work", segments, repeat_count)
    }

    fn counter<E: Entity>(store: &LocalStore<E>) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let subscription = store.subscribe(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    #[test]
    fn test_create_fills_defaults_and_persists() {
        let slot = MemorySlot::new();
        let store = LocalStore::<Timer>::open(slot.clone(), ManualTime::new(t0()));
        let timer = store.create(timer_draft(&[25, 5], 2)).unwrap();

        assert_eq!(timer.status, TimerStatus::Idle);
        assert_eq!(timer.remaining_time, 25);
        assert_eq!(store.count(), 1);
        assert!(slot.read("timers").unwrap().is_some());
    }

    #[test]
    fn test_create_rejects_duplicate_id() {
        let store = LocalStore::<Note>::in_memory();
        let id = EntityId::from_remote("n-1");
        let mut draft = NoteDraft::new("One", "");
        draft.id = Some(id.clone());
        store.create(draft.clone()).unwrap();
        assert!(store.create(draft).is_err());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_update_keeps_id_and_created_at() {
        let time = ManualTime::new(t0());
        let store = LocalStore::<Note>::open(MemorySlot::new(), time.clone());
        let note = store.create(NoteDraft::new("One", "body")).unwrap();

        time.advance_secs(10);
        let updated = store
            .update(
                &note.id,
                NotePatch {
                    title: Some("Renamed".into()),
                    ..NotePatch::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, note.id);
        assert_eq!(updated.created_at, t0());
        assert_eq!(updated.updated_at, t0() + chrono::Duration::seconds(10));
        assert_eq!(updated.title, "Renamed");
    }

    #[test]
    fn test_modify_cannot_change_id_or_created_at() {
        let store = LocalStore::<Note>::in_memory();
        let note = store.create(NoteDraft::new("One", "")).unwrap();
        let (updated, ()) = store
            .modify(&note.id, |n| {
                n.id = EntityId::from_remote("hijacked");
                n.created_at = t0();
                Some(())
            })
            .unwrap();
        assert_eq!(updated.id, note.id);
        assert_eq!(updated.created_at, note.created_at);
    }

    #[test]
    fn test_unknown_id_is_absent() {
        let store = LocalStore::<Note>::in_memory();
        let (count, _subscription) = counter(&store);
        let missing = EntityId::from_remote("missing");

        assert!(store.get_by_id(&missing).is_none());
        assert!(store.update(&missing, NotePatch::default()).unwrap().is_none());
        assert!(store.modify(&missing, |_| Some(())).is_none());
        assert!(!store.delete(&missing));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_declined_modify_does_not_notify() {
        let store = LocalStore::<Note>::in_memory();
        let note = store.create(NoteDraft::new("One", "")).unwrap();
        let (count, _subscription) = counter(&store);

        assert!(store.modify(&note.id, |_| None::<()>).is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(store.get_by_id(&note.id).unwrap(), note);
    }

    #[test]
    fn test_subscriber_fan_out_and_unsubscribe() {
        let store = LocalStore::<Note>::in_memory();
        let (first, first_sub) = counter(&store);
        let (second, _second_sub) = counter(&store);
        let (third, _third_sub) = counter(&store);

        let note = store.create(NoteDraft::new("One", "")).unwrap();
        for count in [&first, &second, &third] {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }

        first_sub.unsubscribe();
        store.delete(&note.id);
        store.clear();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 3);
        assert_eq!(third.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_listener_sees_committed_state() {
        let store = Arc::new(LocalStore::<Note>::in_memory());
        let observed = Arc::new(AtomicUsize::new(0));
        let (inner, seen) = (Arc::downgrade(&store), observed.clone());
        let _subscription = store.subscribe(move || {
            if let Some(store) = inner.upgrade() {
                seen.store(store.count(), Ordering::SeqCst);
            }
        });

        store.create(NoteDraft::new("One", "")).unwrap();
        store.create(NoteDraft::new("Two", "")).unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let slot = MemorySlot::new();
        let time = ManualTime::new(t0());
        let store = LocalStore::<Timer>::open(slot.clone(), time.clone());
        store.create(timer_draft(&[25, 5], 4)).unwrap();
        let paused = store.create(timer_draft(&[10], 1)).unwrap();
        store.modify(&paused.id, |t| t.start(t0()).then_some(()));
        store.modify(&paused.id, |t| t.pause(t0()).then_some(()));

        let reloaded = LocalStore::<Timer>::open(slot, time);
        assert_eq!(reloaded.get_all(), store.get_all());
    }

    #[test]
    fn test_open_rehydrates_running_timers() {
        let slot = MemorySlot::new();
        let time = ManualTime::new(t0());
        let store = LocalStore::<Timer>::open(slot.clone(), time.clone());
        let timer = store.create(timer_draft(&[10], 1)).unwrap();
        store.modify(&timer.id, |t| t.start(t0()).then_some(()));

        time.advance_secs(15);
        let reloaded = LocalStore::<Timer>::open(slot, time);
        let timer = reloaded.get_by_id(&timer.id).unwrap();
        assert_eq!(timer.status, TimerStatus::Completed);
        assert_eq!(timer.remaining_time, 0);
        assert_eq!(timer.total_elapsed_time, 10);
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let slot = MemorySlot::new();
        slot.write("notes", "[[\"id\", 42]]").unwrap();
        let store = LocalStore::<Note>::open(slot, ManualTime::new(t0()));
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_put_keeps_local_created_at() {
        let time = ManualTime::new(t0());
        let store = LocalStore::<Note>::open(MemorySlot::new(), time.clone());
        let local = store.create(NoteDraft::new("One", "")).unwrap();

        let mut remote = local.clone();
        remote.title = "Remote".into();
        remote.created_at = t0() - chrono::Duration::days(1);
        remote.updated_at = t0() + chrono::Duration::seconds(99);
        let stored = store.put(remote);

        assert_eq!(stored.created_at, local.created_at);
        assert_eq!(stored.updated_at, t0() + chrono::Duration::seconds(99));
        assert_eq!(store.get_by_id(&local.id).unwrap().title, "Remote");
    }

    #[test]
    fn test_rekey_moves_entry() {
        let store = LocalStore::<Note>::in_memory();
        let note = store.create(NoteDraft::new("One", "")).unwrap();
        let remote_id = EntityId::from_remote("srv-1");
        let rekeyed = store.rekey(&note.id, remote_id.clone()).unwrap();
        assert_eq!(rekeyed.created_at, note.created_at);

        assert!(store.get_by_id(&note.id).is_none());
        assert_eq!(store.get_by_id(&remote_id).unwrap().title, "One");
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_clear_always_notifies() {
        let store = LocalStore::<Note>::in_memory();
        let (count, _subscription) = counter(&store);
        store.clear();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
