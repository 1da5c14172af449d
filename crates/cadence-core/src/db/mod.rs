//! Database layer for Cadence snapshots

mod connection;
mod migrations;
mod slot_repository;

pub use connection::Database;
pub use slot_repository::SqliteSlotStore;
