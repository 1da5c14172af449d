//! Global ticker driving RUNNING timers

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Default tick period
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-period ticker. At most one ticker task exists at a time.
#[derive(Debug)]
pub struct Clock {
    period: Duration,
    slot: Arc<Mutex<TickerSlot>>,
}

#[derive(Debug, Default)]
struct TickerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TickerSlot {
    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}

impl Clock {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            slot: Arc::default(),
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the ticker unless one is already running.
    ///
    /// `on_tick` runs once per period, first one period after starting.
    /// When it returns `ControlFlow::Break`, `confirm_stop` is asked again
    /// while `start` is locked out; only a `true` answer ends the ticker.
    /// Returns `true` when a new ticker was spawned.
    pub fn start<F, C>(&self, mut on_tick: F, confirm_stop: C) -> bool
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
        C: Fn() -> bool + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if slot.is_live() {
            return false;
        }

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime available; clock not started");
            return false;
        };

        slot.generation += 1;
        let generation = slot.generation;
        let shared = Arc::downgrade(&self.slot);
        let period = self.period;
        let first = Instant::now() + period;
        slot.handle = Some(runtime.spawn(async move {
            let mut interval = time::interval_at(first, period);
            loop {
                interval.tick().await;
                if on_tick().is_continue() {
                    continue;
                }
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                let mut slot = lock(&shared);
                if confirm_stop() {
                    if slot.generation == generation {
                        slot.handle = None;
                    }
                    tracing::debug!("Clock stopped: nothing left to tick");
                    break;
                }
            }
        }));
        tracing::debug!("Clock started ({:?} period)", period);
        true
    }

    /// Abort the ticker if one is running
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.slot).handle.take() {
            if !handle.is_finished() {
                tracing::debug!("Clock stopped");
            }
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot).is_live()
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.slot).handle.take() {
            handle.abort();
        }
    }
}

fn lock(slot: &Mutex<TickerSlot>) -> MutexGuard<'_, TickerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn counting(count: &Arc<AtomicU32>) -> impl FnMut() -> ControlFlow<()> + Send + 'static {
        let count = count.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let clock = Clock::default();
        let count = Arc::new(AtomicU32::new(0));
        assert!(clock.start(counting(&count), || true));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        for expected in 1..=3 {
            time::advance(Duration::from_secs(1)).await;
            settle().await;
            assert_eq!(count.load(Ordering::SeqCst), expected);
        }
        clock.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_is_noop() {
        let clock = Clock::default();
        let count = Arc::new(AtomicU32::new(0));
        assert!(clock.start(counting(&count), || true));
        assert!(!clock.start(counting(&count), || true));

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let clock = Clock::default();
        let count = Arc::new(AtomicU32::new(0));
        clock.start(counting(&count), || true);
        time::advance(Duration::from_secs(1)).await;
        settle().await;

        clock.stop();
        assert!(!clock.is_running());
        time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_ticker_and_allows_restart() {
        let clock = Clock::default();
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        clock.start(
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Break(())
            },
            || true,
        );

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(!clock.is_running());

        assert!(clock.start(counting(&count), || true));
        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_break_keeps_ticking() {
        let clock = Clock::default();
        let count = Arc::new(AtomicU32::new(0));
        let needed = Arc::new(AtomicBool::new(true));
        let seen = count.clone();
        let still_needed = needed.clone();
        assert!(clock.start(
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Break(())
            },
            move || !still_needed.load(Ordering::SeqCst),
        ));

        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(clock.is_running());
        assert!(!clock.start(counting(&count), || true));

        needed.store(false, Ordering::SeqCst);
        time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!clock.is_running());
        assert!(clock.start(counting(&count), || true));
        clock.stop();
    }

    #[test]
    fn test_start_without_runtime_is_refused() {
        let clock = Clock::default();
        assert!(!clock.start(|| ControlFlow::Continue(()), || true));
        assert!(!clock.is_running());
    }
}
