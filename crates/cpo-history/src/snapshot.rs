//! Latest-snapshot derivation and file document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cpo_common::{HistoryRecord, NormalizedRecord, SiteId, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

/// Most recent record per site.
pub type Snapshot = BTreeMap<SiteId, NormalizedRecord>;

/// Rebuild the snapshot from the history log alone.
///
/// The entry with the greatest `observed_at` wins; on a tie the later log
/// position wins.
pub fn derive_snapshot(history: &[HistoryRecord]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for record in history {
        let newer = snapshot
            .get(&record.site_id)
            .map_or(true, |current| record.observed_at >= current.observed_at);
        if newer {
            snapshot.insert(record.site_id.clone(), record.clone());
        }
    }
    snapshot
}

/// On-disk form of the snapshot, one record per site ordered by site id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<NormalizedRecord>,
}

impl SnapshotDocument {
    pub fn new(snapshot: &Snapshot, generated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at,
            records: snapshot.values().cloned().collect(),
        }
    }

    /// Index the records by site.
    pub fn to_snapshot(&self) -> Snapshot {
        self.records
            .iter()
            .map(|r| (r.site_id.clone(), r.clone()))
            .collect()
    }
}
