//! Sync engine: bootstrap merge, live updates and write-through

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::{plan_merge, MergeAction, MergeReport, RemoteError, RemoteLedger, RemoteSubscription, SharedRemote};
use crate::auth::{AuthHandle, AuthState};
use crate::models::EntityId;
use crate::store::{Entity, LocalStore};

/// Default polling period for collections that cannot push
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Keeps one [`LocalStore`] in step with its remote collection.
///
/// - When a user becomes known, the remote result set is fetched and merged
///   (see [`plan_merge`]).
/// - While the user stays signed in, pushed change notifications are merged
///   as they arrive; collections that cannot push are polled instead.
/// - When the user signs out, the local store and the remote ledger are
///   cleared.
///
/// All merges are serialised through one lock. Local mutations are never
/// blocked by it.
pub struct SyncEngine<E: Entity> {
    inner: Arc<Inner<E>>,
}

impl<E: Entity> Clone for SyncEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<E: Entity> {
    store: Arc<LocalStore<E>>,
    remote: SharedRemote<E>,
    auth: AuthHandle,
    ledger: Mutex<RemoteLedger>,
    merge_lock: tokio::sync::Mutex<()>,
    /// Local ids whose remote create is in flight
    pending: Mutex<HashSet<EntityId>>,
    poll_interval: Duration,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Entity> SyncEngine<E> {
    pub fn new(
        store: Arc<LocalStore<E>>,
        remote: SharedRemote<E>,
        auth: AuthHandle,
        poll_interval: Duration,
    ) -> Self {
        let ledger = RemoteLedger::load(store.slot().as_ref(), E::KIND);
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                auth,
                ledger: Mutex::new(ledger),
                merge_lock: tokio::sync::Mutex::new(()),
                pending: Mutex::default(),
                poll_interval,
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn store(&self) -> &Arc<LocalStore<E>> {
        &self.inner.store
    }

    pub fn auth(&self) -> &AuthHandle {
        &self.inner.auth
    }

    /// Whether `id` is known to exist in the remote collection
    pub fn is_known_remotely(&self, id: &EntityId) -> bool {
        self.inner.ledger().contains(id)
    }

    /// Fetch and merge the signed-in user's collection now. `None` when no
    /// user is signed in or the fetch failed.
    pub async fn sync(&self) -> Option<MergeReport> {
        let user_id = self.inner.auth.user_id()?;
        self.inner.sync_user(&user_id).await
    }

    /// Mirror a freshly created local entity and re-file it under the
    /// server-assigned id. Returns the entity as currently stored.
    ///
    /// Runs between merges: a merge whose fetch predates the remote create
    /// never sees the entity, so it can neither upload it twice nor treat
    /// it as deleted remotely.
    pub async fn publish_created(&self, entity: E) -> E {
        if self.inner.auth.user_id().is_none() {
            return entity;
        }

        let _pending = Pending::track(&self.inner.pending, entity.id().clone());
        self.inner.publish(entity).await
    }

    /// Mirror a partial write. Entities never uploaded are skipped; the next
    /// sync uploads them whole.
    pub async fn mirror_update(&self, id: &EntityId, patch: &E::Patch) {
        if self.inner.auth.user_id().is_none() {
            return;
        }
        if !self.is_known_remotely(id) {
            tracing::debug!("Skipping remote update of unsynced {} {}", E::KIND, id);
            return;
        }
        if let Err(error) = self.inner.remote.update(id, patch).await {
            tracing::warn!("Failed to mirror {} {} update: {}", E::KIND, id, error);
        }
    }

    pub async fn mirror_delete(&self, id: &EntityId) {
        if self.inner.auth.user_id().is_none() || !self.is_known_remotely(id) {
            return;
        }
        match self.inner.remote.delete(id).await {
            Ok(()) | Err(RemoteError::NotFound(_)) => self.inner.forget(id),
            Err(error) => tracing::warn!("Failed to mirror {} {} delete: {}", E::KIND, id, error),
        }
    }

    /// Drop every local entity and the remote ledger
    pub fn clear_local(&self) {
        self.inner.clear_local();
    }

    /// Start following auth transitions and remote changes in the
    /// background. Returns `false` if already running or outside a runtime.
    pub fn start(&self) -> bool {
        let mut worker = lock(&self.inner.worker);
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available; '{}' sync not started", E::KIND);
            return false;
        };

        let receiver = self.inner.auth.subscribe();
        *worker = Some(runtime.spawn(run(Arc::downgrade(&self.inner), receiver)));
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = lock(&self.inner.worker).take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.worker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl<E: Entity> Inner<E> {
    fn ledger(&self) -> MutexGuard<'_, RemoteLedger> {
        lock(&self.ledger)
    }

    fn remember(&self, id: EntityId) {
        self.ledger().insert(self.store.slot().as_ref(), id);
    }

    fn forget(&self, id: &EntityId) {
        self.ledger().remove(self.store.slot().as_ref(), id);
    }

    /// Remote create, serialised with merges
    async fn publish(&self, entity: E) -> E {
        let _merging = self.merge_lock.lock().await;
        // Deleted, cleared or re-keyed while waiting
        let Some(current) = self.store.get_by_id(entity.id()) else {
            return entity;
        };
        let Some(user_id) = self.auth.user_id() else {
            return current;
        };

        match self.remote.create(&user_id, &current).await {
            Ok(remote_id) => {
                self.remember(remote_id.clone());
                self.store
                    .rekey(current.id(), remote_id)
                    .unwrap_or(current)
            }
            Err(error) => {
                tracing::warn!(
                    "Failed to create remote {} {}; it will be uploaded on next sync: {}",
                    E::KIND,
                    current.id(),
                    error
                );
                current
            }
        }
    }

    fn clear_local(&self) {
        self.store.clear();
        self.ledger().clear(self.store.slot().as_ref());
        tracing::info!("Cleared local '{}' after sign-out", E::KIND);
    }

    async fn sync_user(&self, user_id: &str) -> Option<MergeReport> {
        let _merging = self.merge_lock.lock().await;
        match self.remote.fetch_all(user_id).await {
            Ok(remote) => Some(self.merge(user_id, remote).await),
            Err(error) => {
                tracing::warn!("Failed to fetch remote '{}': {}", E::KIND, error);
                None
            }
        }
    }

    /// Apply a merge plan. Callers hold `merge_lock`.
    async fn merge(&self, user_id: &str, remote: Vec<E>) -> MergeReport {
        let mut report = MergeReport::default();
        let mut known = remote
            .iter()
            .map(|entity| entity.id().clone())
            .collect::<Vec<_>>();
        let local = {
            let pending = lock(&self.pending);
            self.store
                .get_all()
                .into_iter()
                .filter(|entity| !pending.contains(entity.id()))
                .collect::<Vec<_>>()
        };
        let actions = {
            let ledger = self.ledger();
            plan_merge(&local, remote, &ledger, self.store.now(), &mut report)
        };

        // Local writes first so the store converges before any remote I/O
        let mut remote_writes = Vec::new();
        for action in actions {
            match action {
                MergeAction::Adopt(entity) => {
                    self.store.put(entity);
                    report.adopted += 1;
                }
                MergeAction::Overwrite(entity) => {
                    self.store.put(entity);
                    report.overwritten += 1;
                }
                MergeAction::DeleteLocal(id) => {
                    if self.store.delete(&id) {
                        report.deleted += 1;
                    }
                }
                action @ (MergeAction::Push { .. } | MergeAction::Upload(_)) => {
                    remote_writes.push(action);
                }
            }
        }

        for action in remote_writes {
            match action {
                MergeAction::Push { id, patch } => match self.remote.update(&id, &patch).await {
                    Ok(()) => report.pushed += 1,
                    Err(error) => {
                        tracing::warn!("Failed to push local {} {}: {}", E::KIND, id, error);
                        report.failed += 1;
                    }
                },
                MergeAction::Upload(entity) => {
                    match self.remote.create(user_id, &entity).await {
                        Ok(remote_id) => {
                            self.store.rekey(entity.id(), remote_id.clone());
                            known.push(remote_id);
                            report.uploaded += 1;
                        }
                        Err(error) => {
                            tracing::warn!(
                                "Failed to upload local {} {}: {}",
                                E::KIND,
                                entity.id(),
                                error
                            );
                            report.failed += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        self.ledger().replace(self.store.slot().as_ref(), known);
        tracing::info!(
            adopted = report.adopted,
            overwritten = report.overwritten,
            pushed = report.pushed,
            deleted = report.deleted,
            uploaded = report.uploaded,
            failed = report.failed,
            rejected = report.rejected,
            "Merged remote '{}'",
            E::KIND
        );
        report
    }

    fn open_feed(&self, user_id: &str) -> Feed<E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let callback = Arc::new(move |snapshot: Vec<E>| {
            // Receiver gone means the session ended
            let _ = sender.send(snapshot);
        });

        if let Some(subscription) = self.remote.subscribe(user_id, callback) {
            tracing::debug!("Subscribed to remote '{}' changes", E::KIND);
            Feed::Push {
                receiver,
                subscription,
            }
        } else {
            tracing::debug!(
                "Remote '{}' cannot push; polling every {:?}",
                E::KIND,
                self.poll_interval
            );
            Feed::Poll(poller(self.poll_interval))
        }
    }
}

/// Hides a local id from merges until dropped
struct Pending<'a> {
    ids: &'a Mutex<HashSet<EntityId>>,
    id: EntityId,
}

impl<'a> Pending<'a> {
    fn track(ids: &'a Mutex<HashSet<EntityId>>, id: EntityId) -> Self {
        lock(ids).insert(id.clone());
        Self { ids, id }
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        lock(self.ids).remove(&self.id);
    }
}

enum Feed<E> {
    Push {
        receiver: mpsc::UnboundedReceiver<Vec<E>>,
        subscription: RemoteSubscription,
    },
    Poll(Interval),
}

impl<E> Feed<E> {
    fn close(self) {
        if let Self::Push { subscription, .. } = self {
            subscription.unsubscribe();
        }
    }
}

enum Event<E> {
    Auth,
    AuthClosed,
    Snapshot(Vec<E>),
    Poll,
    FeedEnded,
}

fn poller(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_feed_event<E>(feed: &mut Option<Feed<E>>) -> Event<E> {
    match feed {
        Some(Feed::Push { receiver, .. }) => receiver
            .recv()
            .await
            .map_or(Event::FeedEnded, Event::Snapshot),
        Some(Feed::Poll(interval)) => {
            interval.tick().await;
            Event::Poll
        }
        None => std::future::pending().await,
    }
}

async fn run<E: Entity>(inner: Weak<Inner<E>>, mut auth: watch::Receiver<AuthState>) {
    let mut feed: Option<Feed<E>> = None;
    let mut current_user: Option<String> = None;

    loop {
        let state = auth.borrow_and_update().clone();
        if !state.is_loading {
            let user_id = state.current_user.map(|user| user.id);
            if user_id != current_user {
                let Some(engine) = inner.upgrade() else {
                    break;
                };
                if let Some(previous) = feed.take() {
                    previous.close();
                }
                match &user_id {
                    Some(user_id) => {
                        tracing::info!("User {} present; syncing '{}'", user_id, E::KIND);
                        engine.sync_user(user_id).await;
                        feed = Some(engine.open_feed(user_id));
                    }
                    None if current_user.is_some() => engine.clear_local(),
                    None => {}
                }
                current_user = user_id;
            }
        }

        let event = tokio::select! {
            changed = auth.changed() => if changed.is_ok() { Event::Auth } else { Event::AuthClosed },
            event = next_feed_event(&mut feed) => event,
        };

        let Some(user_id) = current_user.as_deref() else {
            if matches!(event, Event::AuthClosed) {
                break;
            }
            continue;
        };
        match event {
            Event::Auth => {}
            Event::AuthClosed => break,
            Event::Snapshot(remote) => {
                let Some(engine) = inner.upgrade() else {
                    break;
                };
                let _merging = engine.merge_lock.lock().await;
                engine.merge(user_id, remote).await;
            }
            Event::Poll => {
                let Some(engine) = inner.upgrade() else {
                    break;
                };
                engine.sync_user(user_id).await;
            }
            Event::FeedEnded => {
                let Some(engine) = inner.upgrade() else {
                    break;
                };
                tracing::warn!("Remote '{}' subscription ended; polling instead", E::KIND);
                feed = Some(Feed::Poll(poller(engine.poll_interval)));
            }
        }
    }

    if let Some(feed) = feed {
        feed.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
