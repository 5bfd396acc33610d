//! Carpark occupancy history storage.
//!
//! This crate provides:
//! - The pure history merge (append-only, deduplicated on site and time)
//! - Snapshot derivation from the history log
//! - JSONL history and JSON snapshot files written by atomic replace

pub mod merge;
pub mod snapshot;
pub mod store;

pub use merge::{merge, MergeOutcome};
pub use snapshot::{derive_snapshot, Snapshot, SnapshotDocument};
pub use store::{HistoryError, HistoryStore, LoadedHistory, PersistReport};
