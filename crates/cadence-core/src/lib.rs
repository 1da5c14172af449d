//! cadence-core - Core library for Cadence
//!
//! This crate contains the timer state machine, the local entity store with
//! durable snapshots, and the local/remote synchronization engine shared by
//! every Cadence interface.

pub mod alert;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rehydrate;
pub mod services;
pub mod stats;
pub mod store;
pub mod sync;
pub mod time;
pub mod util;

pub use error::{Error, Result};
pub use models::{EntityId, Note, Segment, SegmentKind, Timer, TimerStatus};
