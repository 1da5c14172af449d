//! Timer facade: state machine commands, clock control and write-through

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::alert::{BoundaryAlert, NoopAlert, SharedAlert};
use crate::clock::{Clock, TICK_INTERVAL};
use crate::models::{EntityId, TickOutcome, Timer, TimerDraft, TimerPatch, TimerStatus};
use crate::stats::TimerStats;
use crate::store::{LocalStore, Subscription};
use crate::sync::{MergeReport, SyncEngine};
use crate::Result;

/// Commands and queries over timers.
///
/// Local mutations apply immediately; when a sync engine is attached and a
/// user is signed in, each command then mirrors its change to the remote
/// collection (best effort). Cloning is cheap and shares state.
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<LocalStore<Timer>>,
    clock: Clock,
    alert: SharedAlert,
    sync: Option<SyncEngine<Timer>>,
    active: Mutex<Option<EntityId>>,
    watcher: Mutex<Option<Subscription>>,
}

/// Timers still RUNNING after a clock firing, and those that completed
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub running: usize,
    pub completed: Vec<Timer>,
}

impl TimerService {
    pub fn new(
        store: Arc<LocalStore<Timer>>,
        sync: Option<SyncEngine<Timer>>,
        alert: SharedAlert,
        tick_interval: Duration,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let watcher = {
                let weak = weak.clone();
                store.subscribe(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_store_change();
                    }
                })
            };
            Inner {
                store,
                clock: Clock::new(tick_interval),
                alert,
                sync,
                active: Mutex::new(None),
                watcher: Mutex::new(Some(watcher)),
            }
        });

        if inner.running_count() > 0 {
            inner.refresh_clock();
        }
        Self { inner }
    }

    /// Local-only service with a silent alert and the default tick period
    pub fn local(store: Arc<LocalStore<Timer>>) -> Self {
        Self::new(store, None, Arc::new(NoopAlert), TICK_INTERVAL)
    }

    pub fn store(&self) -> &Arc<LocalStore<Timer>> {
        &self.inner.store
    }

    pub fn sync_engine(&self) -> Option<&SyncEngine<Timer>> {
        self.inner.sync.as_ref()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Create an IDLE timer
    pub async fn create(&self, draft: TimerDraft) -> Result<Timer> {
        let timer = self.inner.store.create(draft)?;
        tracing::debug!("Created timer {} ({})", timer.id, timer.name);
        match &self.inner.sync {
            Some(sync) => Ok(sync.publish_created(timer).await),
            None => Ok(timer),
        }
    }

    /// Edit fields. `None` if the id is unknown.
    pub async fn update(&self, id: &EntityId, patch: TimerPatch) -> Result<Option<Timer>> {
        let Some(timer) = self.inner.store.update(id, patch.clone())? else {
            return Ok(None);
        };
        self.inner.refresh_clock();
        if let Some(sync) = &self.inner.sync {
            sync.mirror_update(id, &patch).await;
        }
        Ok(Some(timer))
    }

    /// IDLE or PAUSED to RUNNING and select it. Other statuses return the
    /// timer unchanged; unknown ids return `None`.
    pub async fn start(&self, id: &EntityId) -> Option<Timer> {
        let now = self.inner.store.now();
        let Some((timer, ())) = self.inner.store.modify(id, |t| t.start(now).then_some(())) else {
            return self.inner.store.get_by_id(id);
        };

        self.set_active(Some(id.clone()));
        self.inner.refresh_clock();
        self.mirror_progress(&timer).await;
        Some(timer)
    }

    /// RUNNING to PAUSED. `None` unless the timer is currently RUNNING.
    pub async fn pause(&self, id: &EntityId) -> Option<Timer> {
        let now = self.inner.store.now();
        let (timer, ()) = self
            .inner
            .store
            .modify(id, |t| t.pause(now).then_some(()))?;

        self.inner.refresh_clock();
        self.mirror_progress(&timer).await;
        Some(timer)
    }

    /// Back to the first segment, IDLE, from any status
    pub async fn reset(&self, id: &EntityId) -> Option<Timer> {
        let (timer, ()) = self.inner.store.modify(id, |t| {
            t.reset_progress();
            Some(())
        })?;

        self.inner.refresh_clock();
        self.mirror_progress(&timer).await;
        Some(timer)
    }

    /// ARCHIVED from any status; already archived timers are returned as is
    pub async fn archive(&self, id: &EntityId) -> Option<Timer> {
        let Some((timer, ())) = self.inner.store.modify(id, |t| t.archive().then_some(())) else {
            return self.inner.store.get_by_id(id);
        };

        self.inner.refresh_clock();
        self.mirror_progress(&timer).await;
        Some(timer)
    }

    /// Remove the timer, clearing the selection if it pointed at it
    pub async fn delete(&self, id: &EntityId) -> bool {
        if !self.inner.store.delete(id) {
            return false;
        }

        self.inner.clear_active_if(id);
        self.inner.refresh_clock();
        if let Some(sync) = &self.inner.sync {
            sync.mirror_delete(id).await;
        }
        true
    }

    /// One clock firing for one timer. No-op unless RUNNING; fires the
    /// boundary alert once per segment transition. `None` if unknown.
    pub fn tick(&self, id: &EntityId) -> Option<(Timer, TickOutcome)> {
        self.inner.tick(id)
    }

    /// One clock firing for every RUNNING timer
    pub fn tick_all(&self) -> TickReport {
        self.inner.tick_all()
    }

    /// Fetch and merge the remote collection now
    pub async fn sync(&self) -> Option<MergeReport> {
        let report = self.inner.sync.as_ref()?.sync().await;
        self.inner.refresh_clock();
        report
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: &EntityId) -> Option<Timer> {
        self.inner.store.get_by_id(id)
    }

    pub fn list(&self) -> Vec<Timer> {
        self.inner.store.get_all()
    }

    /// Everything except ARCHIVED
    pub fn active_timers(&self) -> Vec<Timer> {
        self.list()
            .into_iter()
            .filter(|timer| timer.status != TimerStatus::Archived)
            .collect()
    }

    pub fn archived_timers(&self) -> Vec<Timer> {
        self.list()
            .into_iter()
            .filter(|timer| timer.status == TimerStatus::Archived)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner.store.count()
    }

    pub fn running_count(&self) -> usize {
        self.inner.running_count()
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats::from_timers(&self.list())
    }

    pub fn is_clock_running(&self) -> bool {
        self.inner.clock.is_running()
    }

    /// The selected timer, if it still exists
    pub fn active_timer(&self) -> Option<Timer> {
        let id = self.inner.active().clone()?;
        self.inner.store.get_by_id(&id)
    }

    /// Select a timer. Returns false (and keeps the selection) if `id` is
    /// unknown.
    pub fn set_active(&self, id: Option<EntityId>) -> bool {
        if let Some(id) = &id {
            if self.inner.store.get_by_id(id).is_none() {
                return false;
            }
        }
        *self.inner.active() = id;
        true
    }

    /// Called after every store change
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.inner.store.subscribe(listener)
    }

    async fn mirror_progress(&self, timer: &Timer) {
        if let Some(sync) = &self.inner.sync {
            sync.mirror_update(&timer.id, &TimerPatch::progress_of(timer))
                .await;
        }
    }
}

impl Inner {
    fn active(&self) -> MutexGuard<'_, Option<EntityId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_active_if(&self, id: &EntityId) {
        let mut active = self.active();
        if active.as_ref() == Some(id) {
            *active = None;
        }
    }

    fn running_count(&self) -> usize {
        count_running(&self.store)
    }

    /// Remote merges and adoptions can bring in RUNNING timers or drop the
    /// selected one.
    fn on_store_change(self: &Arc<Self>) {
        let selected = self.active().clone();
        if let Some(id) = selected {
            if self.store.get_by_id(&id).is_none() {
                self.clear_active_if(&id);
            }
        }
        if self.running_count() > 0 && !self.clock.is_running() {
            self.start_clock();
        }
    }

    /// Run the clock exactly while some timer is RUNNING
    fn refresh_clock(self: &Arc<Self>) {
        if self.running_count() > 0 {
            self.start_clock();
        } else {
            self.clock.stop();
        }
    }

    fn start_clock(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let store = Arc::downgrade(&self.store);
        self.clock.start(
            move || {
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                if inner.tick_all().running == 0 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
            // A timer started since the last firing keeps the ticker alive
            move || store.upgrade().is_none_or(|store| count_running(&store) == 0),
        );
    }

    fn tick(&self, id: &EntityId) -> Option<(Timer, TickOutcome)> {
        let Some((timer, outcome)) = self.store.modify(id, |timer| {
            let outcome = timer.tick();
            (outcome != TickOutcome::Skipped).then_some(outcome)
        }) else {
            return self
                .store
                .get_by_id(id)
                .map(|timer| (timer, TickOutcome::Skipped));
        };

        if outcome.is_boundary() {
            self.alert
                .boundary(&BoundaryAlert::for_timer(&timer, outcome));
        }
        if outcome == TickOutcome::Completed {
            tracing::info!("Timer {} completed", timer.id);
            self.mirror_in_background(&timer);
        }
        Some((timer, outcome))
    }

    fn tick_all(&self) -> TickReport {
        let running = self
            .store
            .get_all()
            .into_iter()
            .filter(|timer| timer.status == TimerStatus::Running)
            .map(|timer| timer.id)
            .collect::<Vec<_>>();

        let mut report = TickReport::default();
        for id in running {
            match self.tick(&id) {
                Some((timer, TickOutcome::Completed)) => report.completed.push(timer),
                Some((timer, _)) if timer.status == TimerStatus::Running => report.running += 1,
                _ => {}
            }
        }
        report
    }

    /// Ticks are local only; status changes they cause are mirrored
    fn mirror_in_background(&self, timer: &Timer) {
        let Some(sync) = self.sync.clone() else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            tracing::debug!("No runtime; completion of {} not mirrored", timer.id);
            return;
        };
        let id = timer.id.clone();
        let patch = TimerPatch::progress_of(timer);
        runtime.spawn(async move {
            sync.mirror_update(&id, &patch).await;
        });
    }
}

fn count_running(store: &LocalStore<Timer>) -> usize {
    store
        .get_all()
        .iter()
        .filter(|timer| timer.status == TimerStatus::Running)
        .count()
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(watcher) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::RecordingAlert;
    use crate::auth::{AuthHandle, AuthState, AuthUser};
    use crate::models::{Segment, SegmentKind, TimerPreset};
    use crate::store::MemorySlot;
    use crate::sync::{MemoryRemote, RemoteCollection};
    use crate::time::{ManualTime, SharedTime, TimeSource};
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    struct Harness {
        time: Arc<ManualTime>,
        alerts: Arc<RecordingAlert>,
        service: TimerService,
    }

    fn harness() -> Harness {
        let time = ManualTime::new(t0());
        let store = Arc::new(LocalStore::open(MemorySlot::new(), time.clone()));
        let alerts = RecordingAlert::new();
        let service = TimerService::new(store, None, alerts.clone(), TICK_INTERVAL);
        Harness {
            time,
            alerts,
            service,
        }
    }

    fn draft(durations: &[u32], repeat_count: u32) -> TimerDraft {
        let segments = durations
            .iter()
            .map(|&d| Segment::new(SegmentKind::Focus, d, "Focus"))
            .collect();
        TimerDraft::new("Session", segments, repeat_count)
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn tick_counts_down_one_second() {
        let h = harness();
        let timer = h.service.create(draft(&[5], 1)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();

        let (timer, outcome) = h.service.tick(&timer.id).unwrap();
        assert_eq!(outcome, TickOutcome::Counted);
        assert_eq!(timer.remaining_time, 4);
        assert_eq!(timer.total_elapsed_time, 1);
        assert_eq!(timer.status, TimerStatus::Running);
    }

    #[tokio::test]
    async fn segment_transition_after_countdown() {
        let h = harness();
        let timer = h.service.create(draft(&[1, 5], 1)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();

        h.service.tick(&timer.id);
        let (timer, outcome) = h.service.tick(&timer.id).unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Advanced {
                segment_index: 1,
                repeat: 1
            }
        );
        assert_eq!(timer.current_segment_index, 1);
        assert_eq!(timer.remaining_time, 5);
        assert_eq!(h.alerts.alerts().len(), 1);
    }

    #[tokio::test]
    async fn completion_fires_one_alert() {
        let h = harness();
        let timer = h.service.create(draft(&[1], 1)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();

        h.service.tick(&timer.id);
        let (timer, outcome) = h.service.tick(&timer.id).unwrap();
        assert_eq!(outcome, TickOutcome::Completed);
        assert_eq!(timer.status, TimerStatus::Completed);

        let (_, outcome) = h.service.tick(&timer.id).unwrap();
        assert_eq!(outcome, TickOutcome::Skipped);
        assert_eq!(h.alerts.alerts().len(), 1);
    }

    #[tokio::test]
    async fn repeat_wraps_to_first_segment() {
        let h = harness();
        let timer = h.service.create(draft(&[1], 2)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();

        h.service.tick(&timer.id);
        let (timer, _) = h.service.tick(&timer.id).unwrap();
        assert_eq!(timer.current_repeat, 2);
        assert_eq!(timer.current_segment_index, 0);
        assert_eq!(timer.remaining_time, 1);
    }

    #[tokio::test]
    async fn reset_restores_initial_progress_from_any_state() {
        let h = harness();
        let timer = h.service.create(draft(&[3, 4], 2)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();
        for _ in 0..6 {
            h.service.tick(&timer.id);
        }
        h.service.pause(&timer.id).await.unwrap();

        let reset = h.service.reset(&timer.id).await.unwrap();
        assert_eq!(reset.current_segment_index, 0);
        assert_eq!(reset.current_repeat, 1);
        assert_eq!(reset.status, TimerStatus::Idle);
        assert_eq!(reset.remaining_time, 3);
        assert_eq!(reset.total_elapsed_time, 0);
        assert_eq!(reset.paused_at, None);
        assert!(!h.service.is_clock_running());
    }

    #[tokio::test]
    async fn pause_resume_charges_paused_interval() {
        let h = harness();
        let timer = h.service.create(draft(&[60], 1)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();
        for _ in 0..5 {
            h.service.tick(&timer.id);
        }

        h.time.advance_secs(5);
        let paused = h.service.pause(&timer.id).await.unwrap();
        assert_eq!(paused.status, TimerStatus::Paused);
        assert_eq!(paused.paused_at, Some(t0() + chrono::Duration::seconds(5)));
        assert_eq!(paused.remaining_time, 55);

        h.time.advance_secs(30);
        let resumed = h.service.start(&timer.id).await.unwrap();
        assert_eq!(resumed.total_elapsed_time, paused.total_elapsed_time + 30);
        assert_eq!(resumed.remaining_time, 55);
        assert_eq!(resumed.paused_at, None);
    }

    #[tokio::test]
    async fn start_policies() {
        let h = harness();
        assert!(h.service.start(&EntityId::from_remote("missing")).await.is_none());

        let timer = h.service.create(draft(&[1], 1)).await.unwrap();
        let running = h.service.start(&timer.id).await.unwrap();
        assert_eq!(h.service.start(&timer.id).await.unwrap(), running);

        let archived = h.service.archive(&timer.id).await.unwrap();
        assert_eq!(archived.status, TimerStatus::Archived);
        assert_eq!(h.service.start(&timer.id).await.unwrap(), archived);
    }

    #[tokio::test]
    async fn pause_requires_running() {
        let h = harness();
        let timer = h.service.create(draft(&[10], 1)).await.unwrap();
        assert!(h.service.pause(&timer.id).await.is_none());
        assert!(h.service.pause(&EntityId::from_remote("missing")).await.is_none());
    }

    #[tokio::test]
    async fn delete_clears_selection() {
        let h = harness();
        let timer = h.service.create(draft(&[10], 1)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();
        assert_eq!(h.service.active_timer().unwrap().id, timer.id);

        assert!(h.service.delete(&timer.id).await);
        assert!(h.service.active_timer().is_none());
        assert!(!h.service.delete(&timer.id).await);
        assert!(!h.service.is_clock_running());
    }

    #[tokio::test]
    async fn set_active_rejects_unknown_ids() {
        let h = harness();
        let timer = h.service.create(draft(&[10], 1)).await.unwrap();
        assert!(h.service.set_active(Some(timer.id.clone())));
        assert!(!h.service.set_active(Some(EntityId::from_remote("nope"))));
        assert_eq!(h.service.active_timer().unwrap().id, timer.id);
        assert!(h.service.set_active(None));
        assert!(h.service.active_timer().is_none());
    }

    #[tokio::test]
    async fn archived_timers_are_grouped_separately() {
        let h = harness();
        let kept = h.service.create(draft(&[10], 1)).await.unwrap();
        let archived = h.service.create(draft(&[10], 1)).await.unwrap();
        h.service.archive(&archived.id).await.unwrap();

        let active_ids = h
            .service
            .active_timers()
            .into_iter()
            .map(|t| t.id)
            .collect::<Vec<_>>();
        assert_eq!(active_ids, vec![kept.id]);
        assert_eq!(h.service.archived_timers().len(), 1);
        assert_eq!(h.service.stats().archived_count, 1);
    }

    #[tokio::test]
    async fn edit_while_idle_follows_new_first_segment() {
        let h = harness();
        let timer = h.service.create(draft(&[10], 1)).await.unwrap();
        let patch = TimerPatch {
            segments: Some(vec![Segment::new(SegmentKind::Focus, 90, "Longer")]),
            ..TimerPatch::default()
        };
        let updated = h.service.update(&timer.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.remaining_time, 90);
        assert_eq!(updated.status, TimerStatus::Idle);
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected() {
        let h = harness();
        assert!(h.service.create(draft(&[], 1)).await.is_err());
        assert!(h.service.create(draft(&[10], 0)).await.is_err());
        assert_eq!(h.service.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_drives_running_timers_and_stops_when_done() {
        let h = harness();
        let timer = h.service.create(draft(&[2], 1)).await.unwrap();
        h.service.start(&timer.id).await.unwrap();
        assert!(h.service.is_clock_running());

        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        assert_eq!(h.service.get(&timer.id).unwrap().remaining_time, 0);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(h.service.get(&timer.id).unwrap().status, TimerStatus::Completed);
        assert!(!h.service.is_clock_running());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_started_during_final_tick_keeps_clock_alive() {
        let h = harness();
        let first = h.service.create(draft(&[1], 1)).await.unwrap();
        let second = h.service.create(draft(&[30], 1)).await.unwrap();
        h.service.start(&first.id).await.unwrap();

        // Start the second timer from inside the firing that completes the first
        let store = Arc::downgrade(h.service.store());
        let (first_id, second_id) = (first.id.clone(), second.id.clone());
        let now = h.time.now();
        let _hook = h.service.subscribe(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            let first_done = store
                .get_by_id(&first_id)
                .is_some_and(|timer| timer.status == TimerStatus::Completed);
            let second_idle = store
                .get_by_id(&second_id)
                .is_some_and(|timer| timer.status == TimerStatus::Idle);
            if first_done && second_idle {
                store.modify(&second_id, |timer| timer.start(now).then_some(()));
            }
        });

        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(1)).await;
            settle().await;
        }
        assert_eq!(h.service.get(&first.id).unwrap().status, TimerStatus::Completed);
        assert_eq!(h.service.get(&second.id).unwrap().status, TimerStatus::Running);
        assert!(h.service.is_clock_running());

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(h.service.get(&second.id).unwrap().remaining_time, 29);
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_last_running_timer_stops_clock() {
        let h = harness();
        let first = h.service.create(draft(&[60], 1)).await.unwrap();
        let second = h.service.create(draft(&[60], 1)).await.unwrap();
        h.service.start(&first.id).await.unwrap();
        h.service.start(&second.id).await.unwrap();

        h.service.pause(&first.id).await.unwrap();
        assert!(h.service.is_clock_running());
        h.service.pause(&second.id).await.unwrap();
        assert!(!h.service.is_clock_running());
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_with_running_timer_restarts_clock() {
        let time = ManualTime::new(t0());
        let slot = MemorySlot::new();
        let shared: SharedTime = time.clone();
        let id = {
            let store = Arc::new(LocalStore::open(slot.clone(), shared.clone()));
            let service = TimerService::local(store);
            let timer = service.create(draft(&[600], 1)).await.unwrap();
            service.start(&timer.id).await.unwrap();
            timer.id
        };

        time.advance_secs(120);
        let store = Arc::new(LocalStore::open(slot, shared));
        let service = TimerService::local(store);
        let timer = service.get(&id).unwrap();
        assert_eq!(timer.remaining_time, 480);
        assert!(service.is_clock_running());
    }

    #[tokio::test]
    async fn commands_mirror_to_remote_when_signed_in() {
        let time = ManualTime::new(t0());
        let shared: SharedTime = time.clone();
        let store = Arc::new(LocalStore::open(MemorySlot::new(), shared.clone()));
        let remote = MemoryRemote::<Timer>::new(shared);
        let auth = AuthHandle::new(AuthState::signed_in(AuthUser::new("u1")));
        let engine = SyncEngine::new(store.clone(), remote.clone(), auth, Duration::from_secs(60));
        let service = TimerService::new(store, Some(engine), Arc::new(NoopAlert), TICK_INTERVAL);

        let timer = service.create(TimerPreset::Pomodoro.draft()).await.unwrap();
        assert!(remote.get(&timer.id).is_some());

        service.start(&timer.id).await.unwrap();
        assert_eq!(remote.get(&timer.id).unwrap().status, TimerStatus::Running);

        // Ticks stay local
        service.tick(&timer.id);
        assert_eq!(remote.updates().len(), 1);

        assert!(service.delete(&timer.id).await);
        assert!(remote.fetch_all("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_is_mirrored() {
        let time = ManualTime::new(t0());
        let shared: SharedTime = time.clone();
        let store = Arc::new(LocalStore::open(MemorySlot::new(), shared.clone()));
        let remote = MemoryRemote::<Timer>::new(shared);
        let auth = AuthHandle::new(AuthState::signed_in(AuthUser::new("u1")));
        let engine = SyncEngine::new(store.clone(), remote.clone(), auth, Duration::from_secs(60));
        let service = TimerService::new(store, Some(engine), Arc::new(NoopAlert), TICK_INTERVAL);

        let timer = service.create(draft(&[1], 1)).await.unwrap();
        service.start(&timer.id).await.unwrap();
        service.tick(&timer.id);
        service.tick(&timer.id);
        settle().await;

        assert_eq!(remote.get(&timer.id).unwrap().status, TimerStatus::Completed);
    }
}
