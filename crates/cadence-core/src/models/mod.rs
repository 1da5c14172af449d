//! Data models for Cadence

mod id;
mod note;
mod preset;
mod timer;

pub use id::EntityId;
pub use note::{Note, NoteDraft, NotePatch};
pub use preset::TimerPreset;
pub use timer::{
    CatchUp, Segment, SegmentKind, TickOutcome, Timer, TimerDraft, TimerPatch, TimerStatus,
};
