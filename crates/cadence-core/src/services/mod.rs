//! Facades combining the local stores with the sync engines

mod note;
mod timer;

pub use note::NoteService;
pub use timer::{TickReport, TimerService};
