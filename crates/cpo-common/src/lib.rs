//! Carpark occupancy common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the ETL crates:
//! - Site and run identity types
//! - Raw and normalized occupancy records
//! - Common error types with stable codes
//! - Schema versioning for the on-disk files

pub mod error;
pub mod id;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
pub use id::{fold_name, RunId, SiteId};
pub use record::{HistoryRecord, NormalizedRecord, RawReading};
pub use schema::SCHEMA_VERSION;
