//! Rehydration of snapshots loaded at startup.
//!
//! A snapshot can be arbitrarily stale when it is loaded. RUNNING timers
//! treat the time since their last `updated_at` as a backlog of ticks and
//! settle it in one catch-up walk; PAUSED, IDLE, COMPLETED and ARCHIVED
//! entities are left as they were. Elapsed pause time is only charged when
//! the timer is resumed.

use chrono::{DateTime, Utc};

use crate::store::Entity;

/// Outcome of rehydrating a loaded snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RehydrationReport {
    /// Entities loaded from the snapshot
    pub loaded: usize,
    /// Entities still running after catch-up
    pub running: usize,
}

impl RehydrationReport {
    /// Whether the clock must be started right away
    pub const fn needs_clock(&self) -> bool {
        self.running > 0
    }
}

/// Settle every loaded entity against `now`
pub fn rehydrate_all<E: Entity>(entries: &mut [E], now: DateTime<Utc>) -> RehydrationReport {
    let running = entries
        .iter_mut()
        .map(|entity| entity.rehydrate(now))
        .filter(|still_running| *still_running)
        .count();
    RehydrationReport {
        loaded: entries.len(),
        running,
    }
}
