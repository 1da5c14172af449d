//! Segment-boundary alerts

use std::sync::{Arc, Mutex, PoisonError};

use crate::models::{SegmentKind, TickOutcome, Timer};

/// What a boundary alert is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryAlert {
    pub timer_name: String,
    pub outcome: TickOutcome,
    /// Kind of the segment just entered; `None` when the timer completed
    pub next_kind: Option<SegmentKind>,
}

impl BoundaryAlert {
    pub fn for_timer(timer: &Timer, outcome: TickOutcome) -> Self {
        let next_kind = match outcome {
            TickOutcome::Advanced { .. } => timer.current_segment().map(|segment| segment.kind),
            _ => None,
        };
        Self {
            timer_name: timer.name.clone(),
            outcome,
            next_kind,
        }
    }

    pub fn message(&self) -> String {
        match (self.outcome, self.next_kind) {
            (TickOutcome::Completed, _) => format!("{} completed", self.timer_name),
            (TickOutcome::Advanced { repeat, .. }, Some(kind)) => {
                format!("{}: {} (round {})", self.timer_name, kind.default_label(), repeat)
            }
            _ => self.timer_name.clone(),
        }
    }
}

/// Audible/haptic collaborator fired once per segment boundary
pub trait AlertSink: Send + Sync {
    fn boundary(&self, alert: &BoundaryAlert);
}

pub type SharedAlert = Arc<dyn AlertSink>;

/// Discards alerts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAlert;

impl AlertSink for NoopAlert {
    fn boundary(&self, _alert: &BoundaryAlert) {}
}

/// Logs alerts through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlert;

impl AlertSink for LogAlert {
    fn boundary(&self, alert: &BoundaryAlert) {
        tracing::info!("{}", alert.message());
    }
}

/// Keeps every alert (tests and previews)
#[derive(Debug, Default)]
pub struct RecordingAlert {
    alerts: Mutex<Vec<BoundaryAlert>>,
}

impl RecordingAlert {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alerts(&self) -> Vec<BoundaryAlert> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AlertSink for RecordingAlert {
    fn boundary(&self, alert: &BoundaryAlert) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(alert.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Segment, TimerDraft};
    use crate::store::Entity;
    use chrono::Utc;

    #[test]
    fn messages_name_the_next_segment() {
        let mut timer = Timer::build(
            TimerDraft::new(
                "Study",
                vec![
                    Segment::new(SegmentKind::Focus, 1, "Focus"),
                    Segment::new(SegmentKind::ShortBreak, 1, "Break"),
                ],
                1,
            ),
            Utc::now(),
        )
        .unwrap();
        timer.current_segment_index = 1;

        let advanced = BoundaryAlert::for_timer(
            &timer,
            TickOutcome::Advanced {
                segment_index: 1,
                repeat: 1,
            },
        );
        assert_eq!(advanced.message(), "Study: Short Break (round 1)");

        let completed = BoundaryAlert::for_timer(&timer, TickOutcome::Completed);
        assert_eq!(completed.message(), "Study completed");
    }
}
