//! Built-in timer presets

use std::fmt;
use std::str::FromStr;

use super::{Segment, SegmentKind, TimerDraft};
use crate::error::Error;

const FOCUS_COLOR: &str = "#ef4444";
const SHORT_BREAK_COLOR: &str = "#10b981";
const LONG_BREAK_COLOR: &str = "#3b82f6";

/// Ready-made segment sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPreset {
    /// 25 minutes focus, 5 minutes break, 4 repeats
    Pomodoro,
    /// 50 minutes focus, 10 minutes break, 3 repeats
    LongPomodoro,
    /// Work with varied breaks, 2 repeats
    WorkCycle,
}

impl TimerPreset {
    pub const ALL: [Self; 3] = [Self::Pomodoro, Self::LongPomodoro, Self::WorkCycle];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro",
            Self::LongPomodoro => "Long Pomodoro",
            Self::WorkCycle => "Work Cycle",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Pomodoro => "Classic 25-5 minute intervals",
            Self::LongPomodoro => "50-10 minute intervals",
            Self::WorkCycle => "Work with varied breaks",
        }
    }

    /// Build a creation draft for this preset
    #[must_use]
    pub fn draft(self) -> TimerDraft {
        let focus = |minutes: u32, label: &str| {
            Segment::new(SegmentKind::Focus, minutes * 60, label).with_color(FOCUS_COLOR)
        };
        let short_break = |minutes: u32, label: &str| {
            Segment::new(SegmentKind::ShortBreak, minutes * 60, label)
                .with_color(SHORT_BREAK_COLOR)
        };

        let (segments, repeat_count) = match self {
            Self::Pomodoro => (vec![focus(25, "Focus"), short_break(5, "Short Break")], 4),
            Self::LongPomodoro => (vec![focus(50, "Deep Focus"), short_break(10, "Break")], 3),
            Self::WorkCycle => (
                vec![
                    focus(45, "Work"),
                    short_break(10, "Short Break"),
                    focus(45, "Work"),
                    Segment::new(SegmentKind::LongBreak, 20 * 60, "Long Break")
                        .with_color(LONG_BREAK_COLOR),
                ],
                2,
            ),
        };

        TimerDraft::new(self.name(), segments, repeat_count).with_description(self.description())
    }
}

impl fmt::Display for TimerPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Self::Pomodoro => "pomodoro",
            Self::LongPomodoro => "long-pomodoro",
            Self::WorkCycle => "work-cycle",
        };
        f.write_str(slug)
    }
}

impl FromStr for TimerPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pomodoro" => Ok(Self::Pomodoro),
            "long-pomodoro" => Ok(Self::LongPomodoro),
            "work-cycle" => Ok(Self::WorkCycle),
            other => Err(Error::InvalidInput(format!("unknown preset '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timer;
    use crate::store::Entity;

    #[test]
    fn test_presets_build_valid_timers() {
        for preset in TimerPreset::ALL {
            let timer = Timer::build(preset.draft(), chrono::Utc::now()).unwrap();
            assert_eq!(timer.name, preset.name());
            assert_eq!(
                timer.remaining_time,
                timer.segments[0].duration_seconds
            );
        }
    }

    #[test]
    fn test_pomodoro_shape() {
        let draft = TimerPreset::Pomodoro.draft();
        assert_eq!(draft.repeat_count, 4);
        assert_eq!(draft.segments.len(), 2);
        assert_eq!(draft.segments[0].duration_seconds, 1500);
        assert_eq!(draft.segments[1].kind, SegmentKind::ShortBreak);
    }

    #[test]
    fn test_preset_parse_roundtrips_display() {
        for preset in TimerPreset::ALL {
            assert_eq!(preset.to_string().parse::<TimerPreset>().unwrap(), preset);
        }
    }
}
