//! Wires the core stores, services and remote collections for one command.

use std::path::Path;
use std::sync::Arc;

use cadence_core::alert::SharedAlert;
use cadence_core::auth::{AuthHandle, AuthState};
use cadence_core::db::SqliteSlotStore;
use cadence_core::services::{NoteService, TimerService};
use cadence_core::store::{Entity, LocalStore, SharedSlot};
use cadence_core::sync::{HttpRemoteCollection, SyncEngine};
use cadence_core::time::system_time;
use cadence_core::{Note, Timer};

use crate::config::CliConfig;
use crate::error::CliError;

pub struct App {
    pub timers: TimerService,
    pub notes: NoteService,
    pub auth: AuthHandle,
}

impl App {
    pub fn open(db_path: &Path, config: &CliConfig, alert: SharedAlert) -> Result<Self, CliError> {
        let slot: SharedSlot = Arc::new(SqliteSlotStore::open(db_path)?);
        tracing::debug!("Opened snapshot database at {}", db_path.display());

        let auth = AuthHandle::new(
            config
                .user
                .clone()
                .map_or_else(AuthState::signed_out, AuthState::signed_in),
        );
        let time = system_time();

        let timer_store = Arc::new(LocalStore::<Timer>::open(slot.clone(), time.clone()));
        let note_store = Arc::new(LocalStore::<Note>::open(slot, time));

        let timer_sync = sync_engine(config, &timer_store, &auth)?;
        let note_sync = sync_engine(config, &note_store, &auth)?;

        Ok(Self {
            timers: TimerService::new(
                timer_store,
                timer_sync,
                alert,
                config.core.tick_interval(),
            ),
            notes: NoteService::new(note_store, note_sync),
            auth,
        })
    }

    pub fn has_remote(&self) -> bool {
        self.timers.sync_engine().is_some()
    }

    /// Follow auth transitions and remote changes in the background.
    /// Returns `false` when no remote is configured.
    pub fn start_live_sync(&self) -> bool {
        let timers = self.timers.sync_engine().is_some_and(SyncEngine::start);
        let notes = self.notes.sync_engine().is_some_and(SyncEngine::start);
        timers || notes
    }

    pub fn stop_live_sync(&self) {
        if let Some(engine) = self.timers.sync_engine() {
            engine.stop();
        }
        if let Some(engine) = self.notes.sync_engine() {
            engine.stop();
        }
    }

    /// Drop every local timer and note along with the remote ledgers
    pub fn clear_local(&self) {
        match (self.timers.sync_engine(), self.notes.sync_engine()) {
            (Some(timers), Some(notes)) => {
                timers.clear_local();
                notes.clear_local();
            }
            _ => {
                self.timers.store().clear();
                self.notes.store().clear();
            }
        }
    }
}

fn sync_engine<E: Entity>(
    config: &CliConfig,
    store: &Arc<LocalStore<E>>,
    auth: &AuthHandle,
) -> Result<Option<SyncEngine<E>>, CliError> {
    let Some(base_url) = config.core.remote_base_url.clone() else {
        return Ok(None);
    };
    let remote = HttpRemoteCollection::<E>::new(base_url, config.api_token.clone())?;
    Ok(Some(SyncEngine::new(
        store.clone(),
        Arc::new(remote),
        auth.clone(),
        config.core.poll_interval(),
    )))
}
