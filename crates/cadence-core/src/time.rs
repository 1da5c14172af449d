//! Wall-clock sources.
//!
//! Every timestamp written by the core (`created_at`, `updated_at`,
//! `paused_at`, rehydration) is read through a [`TimeSource`] so tests can
//! drive time by hand.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Source of the current wall-clock time.
pub trait TimeSource: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a time source.
pub type SharedTime = Arc<dyn TimeSource>;

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shared handle to the system clock.
pub fn system_time() -> SharedTime {
    Arc::new(SystemTime)
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualTime {
    now: Mutex<DateTime<Utc>>,
}

impl ManualTime {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    /// Move the clock forward by `seconds`.
    pub fn advance_secs(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += Duration::seconds(seconds);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole seconds elapsed from `earlier` to `later`, floored and clamped at 0.
pub fn whole_seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    u64::try_from((later - earlier).num_seconds()).unwrap_or(0)
}
