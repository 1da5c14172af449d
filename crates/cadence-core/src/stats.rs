//! Aggregate timer statistics

use serde::Serialize;

use crate::models::{Timer, TimerStatus};

/// Dashboard figures over a set of timers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimerStats {
    /// RUNNING or PAUSED
    pub active_count: usize,
    pub completed_count: usize,
    pub archived_count: usize,
    pub total_elapsed_seconds: u64,
    /// Whole hours of `total_elapsed_seconds`
    pub total_hours: u64,
}

impl TimerStats {
    pub fn from_timers<'a>(timers: impl IntoIterator<Item = &'a Timer>) -> Self {
        let mut stats = Self::default();
        for timer in timers {
            match timer.status {
                TimerStatus::Running | TimerStatus::Paused => stats.active_count += 1,
                TimerStatus::Completed => stats.completed_count += 1,
                TimerStatus::Archived => stats.archived_count += 1,
                TimerStatus::Idle => {}
            }
            stats.total_elapsed_seconds =
                stats.total_elapsed_seconds.saturating_add(timer.total_elapsed_time);
        }
        stats.total_hours = stats.total_elapsed_seconds / 3600;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Segment, SegmentKind, TimerDraft};
    use crate::store::Entity;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn timer(status: TimerStatus, elapsed: u64) -> Timer {
        let mut timer = Timer::build(
            TimerDraft::new("t", vec![Segment::new(SegmentKind::Focus, 60, "Focus")], 1),
            Utc::now(),
        )
        .unwrap();
        timer.status = status;
        timer.total_elapsed_time = elapsed;
        timer
    }

    #[test]
    fn counts_by_status_and_sums_elapsed() {
        let timers = [
            timer(TimerStatus::Running, 1800),
            timer(TimerStatus::Paused, 1800),
            timer(TimerStatus::Completed, 3600),
            timer(TimerStatus::Archived, 100),
            timer(TimerStatus::Idle, 0),
        ];

        assert_eq!(
            TimerStats::from_timers(&timers),
            TimerStats {
                active_count: 2,
                completed_count: 1,
                archived_count: 1,
                total_elapsed_seconds: 7300,
                total_hours: 2,
            }
        );
    }

    #[test]
    fn empty_set_is_zero() {
        assert_eq!(TimerStats::from_timers(&[]), TimerStats::default());
    }
}
