//! Occupancy records as they flow through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::SiteId;

/// One availability reading as reported by the remote source.
///
/// `available_spaces` is kept exactly as reported and may exceed the site's
/// capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    pub site_id: SiteId,
    pub available_spaces: u32,
    /// Local retrieval time, shared by every reading of a run.
    pub observed_at: DateTime<Utc>,
    /// Parking option label reported alongside the reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A reading reconciled against the capacity reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub site_id: SiteId,
    pub display_name: String,
    pub total_spaces: u32,
    /// Clamped to `[0, total_spaces]`.
    pub available_spaces: u32,
    pub occupied_spaces: u32,
    /// Percentage in `[0, 100]`, two decimal places.
    pub occupancy_pct: f64,
    pub observed_at: DateTime<Utc>,
}

impl NormalizedRecord {
    /// Deduplication key of the history log.
    pub fn key(&self) -> (&SiteId, DateTime<Utc>) {
        (&self.site_id, self.observed_at)
    }
}

/// One line of the append-only history log.
pub type HistoryRecord = NormalizedRecord;
