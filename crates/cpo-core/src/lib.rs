//! Carpark occupancy ETL core.
//!
//! One run fetches live availability for the configured sites, reconciles it
//! with the capacity reference and merges the result into the durable
//! history log and latest-state snapshot:
//!
//! - [`fetch`]: single bounded HTTP retrieval and payload decoding
//! - [`normalize`]: occupancy computation and data-quality warnings
//! - [`pipeline`]: the typestate run driver and its [`RunReport`]
//! - [`exit_codes`]: outcome → process status for the scheduler

pub mod exit_codes;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod pipeline;

pub use exit_codes::ExitCode;
pub use fetch::{AvailabilitySource, FetchError, FetchOutcome, FetchedPayload, Fetcher, HttpSource};
pub use normalize::{normalize, DataQualityWarning, NormalizeOutcome};
pub use pipeline::{Pipeline, RunReport, RunState};
