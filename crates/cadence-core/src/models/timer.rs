//! Timer model and its segment/repeat state machine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::error::{Error, Result};
use crate::store::Entity;
use crate::time::whole_seconds_between;
use crate::util::normalize_text_option;

/// Kind of a timed phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentKind {
    Focus,
    ShortBreak,
    LongBreak,
}

impl SegmentKind {
    /// Default label shown for a segment of this kind
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Focus => "Focus",
            Self::ShortBreak => "Short Break",
            Self::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Focus => "focus",
            Self::ShortBreak => "short-break",
            Self::LongBreak => "long-break",
        };
        f.write_str(name)
    }
}

impl FromStr for SegmentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "focus" | "work" => Ok(Self::Focus),
            "short-break" | "break" | "rest" => Ok(Self::ShortBreak),
            "long-break" => Ok(Self::LongBreak),
            other => Err(Error::InvalidInput(format!("unknown segment kind '{other}'"))),
        }
    }
}

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Archived,
}

impl TimerStatus {
    /// RUNNING or PAUSED: a session is in progress
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Completed => "COMPLETED",
            Self::Archived => "ARCHIVED",
        };
        f.write_str(name)
    }
}

/// One timed phase within a timer's sequence.
///
/// Segments are immutable once embedded; edits replace the whole sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub kind: SegmentKind,
    pub duration_seconds: u32,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Segment {
    /// Create a segment with a generated id
    #[must_use]
    pub fn new(kind: SegmentKind, duration_seconds: u32, label: impl Into<String>) -> Self {
        Self {
            id: EntityId::generate().to_string(),
            kind,
            duration_seconds,
            label: label.into(),
            color: None,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A named sequence of segments repeated `repeat_count` times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub segments: Vec<Segment>,
    pub repeat_count: u32,
    pub status: TimerStatus,
    pub current_segment_index: usize,
    pub current_repeat: u32,
    /// Seconds left in the current segment
    pub remaining_time: u32,
    /// Seconds accumulated across the whole running history
    pub total_elapsed_time: u64,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a timer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimerDraft {
    /// Externally supplied id (remote-origin creation); generated when absent
    pub id: Option<EntityId>,
    pub name: String,
    pub description: Option<String>,
    pub segments: Vec<Segment>,
    pub repeat_count: u32,
    /// Starting remaining time; defaults to the first segment's duration
    pub remaining_time: Option<u32>,
}

impl TimerDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, segments: Vec<Segment>, repeat_count: u32) -> Self {
        Self {
            name: name.into(),
            segments,
            repeat_count,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a timer.
///
/// `None` leaves a field untouched. The serialized form (absent fields
/// skipped) is the body of remote partial writes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TimerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_segment_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_repeat: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_elapsed_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<Option<DateTime<Utc>>>,
}

impl TimerPatch {
    /// Status and progress counters of `timer`, the fields a running
    /// session owns.
    #[must_use]
    pub fn progress_of(timer: &Timer) -> Self {
        Self {
            status: Some(timer.status),
            current_segment_index: Some(timer.current_segment_index),
            current_repeat: Some(timer.current_repeat),
            remaining_time: Some(timer.remaining_time),
            total_elapsed_time: Some(timer.total_elapsed_time),
            paused_at: Some(timer.paused_at),
            ..Self::default()
        }
    }

    /// Whether this patch edits the definition (name, segments, repeats)
    #[must_use]
    pub const fn touches_definition(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.segments.is_some()
            || self.repeat_count.is_some()
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer was not running; nothing changed
    Skipped,
    /// One second counted down
    Counted,
    /// Segment boundary crossed into `segment_index` of `repeat`
    Advanced { segment_index: usize, repeat: u32 },
    /// Last segment of the last repeat finished
    Completed,
}

impl TickOutcome {
    /// Whether the tick crossed a segment boundary (alert-worthy)
    #[must_use]
    pub const fn is_boundary(self) -> bool {
        matches!(self, Self::Advanced { .. } | Self::Completed)
    }
}

/// Summary of a rehydration catch-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatchUp {
    /// Ticks that were settled
    pub ticks: u64,
    /// Segment boundaries crossed
    pub boundaries: u32,
    pub completed: bool,
}

impl Timer {
    /// The segment currently counting down
    #[must_use]
    pub fn current_segment(&self) -> Option<&Segment> {
        self.segments.get(self.current_segment_index)
    }

    fn first_duration(&self) -> u32 {
        self.segments.first().map_or(0, |segment| segment.duration_seconds)
    }

    /// Total seconds of one full pass through all segments
    #[must_use]
    pub fn cycle_duration(&self) -> u64 {
        self.segments
            .iter()
            .map(|segment| u64::from(segment.duration_seconds))
            .sum()
    }

    /// Elapsed share of the current segment, in percent
    #[must_use]
    pub fn segment_progress(&self) -> f64 {
        let Some(segment) = self.current_segment() else {
            return 0.0;
        };
        if segment.duration_seconds == 0 {
            return 0.0;
        }
        let duration = f64::from(segment.duration_seconds);
        let elapsed = duration - f64::from(self.remaining_time);
        (elapsed / duration * 100.0).clamp(0.0, 100.0)
    }

    /// Advance by one clock firing.
    ///
    /// With time left in the segment one second is counted down. At a
    /// boundary (`remaining_time == 0`) exactly one transition is taken.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != TimerStatus::Running {
            return TickOutcome::Skipped;
        }

        if self.remaining_time > 0 {
            self.remaining_time -= 1;
            self.total_elapsed_time += 1;
            return TickOutcome::Counted;
        }

        self.transition()
    }

    fn transition(&mut self) -> TickOutcome {
        let mut next_index = self.current_segment_index + 1;

        if next_index >= self.segments.len() {
            let next_repeat = self.current_repeat + 1;
            if next_repeat > self.repeat_count {
                self.status = TimerStatus::Completed;
                return TickOutcome::Completed;
            }
            next_index = 0;
            self.current_repeat = next_repeat;
        }

        self.current_segment_index = next_index;
        self.remaining_time = self
            .segments
            .get(next_index)
            .map_or(0, |segment| segment.duration_seconds);
        TickOutcome::Advanced {
            segment_index: next_index,
            repeat: self.current_repeat,
        }
    }

    /// Settle `ticks` clock firings at once.
    ///
    /// Lands in exactly the state `ticks` calls to [`Timer::tick`] would,
    /// walking whole segments instead of single seconds.
    pub fn catch_up(&mut self, ticks: u64) -> CatchUp {
        let mut summary = CatchUp::default();
        let mut budget = ticks;

        while budget > 0 && self.status == TimerStatus::Running {
            if self.remaining_time > 0 {
                let step = budget.min(u64::from(self.remaining_time));
                // step <= remaining_time, so it fits in u32
                self.remaining_time -= u32::try_from(step).unwrap_or(self.remaining_time);
                self.total_elapsed_time += step;
                budget -= step;
                summary.ticks += step;
            } else {
                budget -= 1;
                summary.ticks += 1;
                summary.boundaries += 1;
                if self.transition() == TickOutcome::Completed {
                    summary.completed = true;
                }
            }
        }

        summary
    }

    /// Back to the first segment of the first repeat, IDLE
    pub fn reset_progress(&mut self) {
        self.current_segment_index = 0;
        self.current_repeat = 1;
        self.status = TimerStatus::Idle;
        self.remaining_time = self.first_duration();
        self.total_elapsed_time = 0;
        self.paused_at = None;
    }

    /// RUNNING, charging a paused interval to `total_elapsed_time` when
    /// resuming. Returns false when the status does not allow starting.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            TimerStatus::Idle => {
                self.status = TimerStatus::Running;
                true
            }
            TimerStatus::Paused => {
                if let Some(paused_at) = self.paused_at.take() {
                    self.total_elapsed_time += whole_seconds_between(paused_at, now);
                }
                self.status = TimerStatus::Running;
                true
            }
            TimerStatus::Running | TimerStatus::Completed | TimerStatus::Archived => false,
        }
    }

    /// PAUSED at `now`. Returns false unless currently RUNNING.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.status = TimerStatus::Paused;
        self.paused_at = Some(now);
        true
    }

    /// ARCHIVED (terminal except for deletion)
    pub fn archive(&mut self) -> bool {
        if self.status == TimerStatus::Archived {
            return false;
        }
        self.status = TimerStatus::Archived;
        self.paused_at = None;
        true
    }

    fn validate_definition(name: &str, segments: &[Segment], repeat_count: u32) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("timer name cannot be empty".into()));
        }
        if segments.is_empty() {
            return Err(Error::InvalidInput(
                "timer needs at least one segment".into(),
            ));
        }
        if let Some(segment) = segments.iter().find(|s| s.duration_seconds == 0) {
            return Err(Error::InvalidInput(format!(
                "segment '{}' must last at least one second",
                segment.label
            )));
        }
        if repeat_count == 0 {
            return Err(Error::InvalidInput("repeat count must be at least 1".into()));
        }
        Ok(())
    }

    /// Clamp progress counters back inside the current definition and keep
    /// `paused_at` set exactly while PAUSED.
    fn normalize(&mut self, now: DateTime<Utc>) {
        if self.current_segment_index >= self.segments.len() {
            self.current_segment_index = self.segments.len().saturating_sub(1);
        }
        self.current_repeat = self.current_repeat.clamp(1, self.repeat_count.max(1));
        let duration = self
            .current_segment()
            .map_or(0, |segment| segment.duration_seconds);
        self.remaining_time = self.remaining_time.min(duration);

        match (self.status, self.paused_at) {
            (TimerStatus::Paused, None) => self.paused_at = Some(now),
            (TimerStatus::Paused, Some(_)) => {}
            (_, Some(_)) => self.paused_at = None,
            (_, None) => {}
        }
    }
}

impl Entity for Timer {
    type Draft = TimerDraft;
    type Patch = TimerPatch;

    const KIND: &'static str = "timers";

    fn build(draft: TimerDraft, now: DateTime<Utc>) -> Result<Self> {
        Self::validate_definition(&draft.name, &draft.segments, draft.repeat_count)?;
        let first = draft.segments[0].duration_seconds;
        let remaining_time = match draft.remaining_time {
            Some(remaining) if remaining > first => {
                return Err(Error::InvalidInput(format!(
                    "remaining time {remaining}s exceeds first segment ({first}s)"
                )));
            }
            Some(remaining) => remaining,
            None => first,
        };

        Ok(Self {
            id: draft.id.unwrap_or_else(EntityId::generate),
            name: draft.name.trim().to_string(),
            description: normalize_text_option(draft.description),
            segments: draft.segments,
            repeat_count: draft.repeat_count,
            status: TimerStatus::Idle,
            current_segment_index: 0,
            current_repeat: 1,
            remaining_time,
            total_elapsed_time: 0,
            paused_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn apply(&mut self, patch: TimerPatch, now: DateTime<Utc>) -> Result<()> {
        let name = patch.name.as_deref().unwrap_or(&self.name);
        let segments = patch.segments.as_deref().unwrap_or(&self.segments);
        let repeat_count = patch.repeat_count.unwrap_or(self.repeat_count);
        Self::validate_definition(name, segments, repeat_count)?;

        let segments_edited = patch.segments.is_some();

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = normalize_text_option(description);
        }
        if let Some(segments) = patch.segments {
            self.segments = segments;
        }
        if let Some(repeat_count) = patch.repeat_count {
            self.repeat_count = repeat_count;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(index) = patch.current_segment_index {
            self.current_segment_index = index;
        }
        if let Some(repeat) = patch.current_repeat {
            self.current_repeat = repeat;
        }
        if let Some(remaining) = patch.remaining_time {
            self.remaining_time = remaining;
        } else if segments_edited
            && self.status == TimerStatus::Idle
            && self.current_segment_index == 0
        {
            // Edit-while-idle: follow the new first segment
            self.remaining_time = self.first_duration();
        }
        if let Some(total) = patch.total_elapsed_time {
            self.total_elapsed_time = total;
        }
        if let Some(paused_at) = patch.paused_at {
            self.paused_at = paused_at;
        }

        self.normalize(now);
        Ok(())
    }

    fn authoritative_patch(&self) -> TimerPatch {
        TimerPatch::progress_of(self)
    }

    fn validated(mut self, now: DateTime<Utc>) -> Result<Self> {
        Self::validate_definition(&self.name, &self.segments, self.repeat_count)?;
        self.normalize(now);
        Ok(self)
    }

    fn is_active(&self) -> bool {
        self.status.is_active()
    }

    fn rehydrate(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }

        let elapsed = whole_seconds_between(self.updated_at, now);
        let summary = self.catch_up(elapsed);
        self.updated_at = now;
        if summary.ticks > 0 {
            tracing::info!(
                timer = %self.id,
                ticks = summary.ticks,
                boundaries = summary.boundaries,
                completed = summary.completed,
                "Settled time elapsed while unloaded"
            );
        }
        true
    }
}
