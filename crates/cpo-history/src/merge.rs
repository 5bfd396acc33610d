//! Append-only merge of new records into the history log.
//!
//! Pure: no I/O. Existing entries are never reordered or mutated, and a
//! record whose `(site_id, observed_at)` key is already present is dropped.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cpo_common::{HistoryRecord, NormalizedRecord, SiteId};

use crate::snapshot::{derive_snapshot, Snapshot};

/// Result of merging one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Existing history followed by the appended records.
    pub history: Vec<HistoryRecord>,
    /// Latest record per site, derived from `history`.
    pub snapshot: Snapshot,
    pub appended: usize,
    pub duplicates_dropped: usize,
    /// Appended records older than the newest entry already logged.
    pub out_of_order: usize,
}

impl MergeOutcome {
    /// Whether the merge left the history unchanged.
    pub fn is_noop(&self) -> bool {
        self.appended == 0
    }
}

/// Merge `new_records` into `existing_history`.
pub fn merge(new_records: &[NormalizedRecord], existing_history: &[HistoryRecord]) -> MergeOutcome {
    let mut seen: HashSet<(&SiteId, DateTime<Utc>)> =
        existing_history.iter().map(NormalizedRecord::key).collect();
    let newest_logged = existing_history.iter().map(|r| r.observed_at).max();

    let mut history = existing_history.to_vec();
    let mut appended = 0;
    let mut duplicates_dropped = 0;
    let mut out_of_order = 0;

    for record in new_records {
        if !seen.insert(record.key()) {
            duplicates_dropped += 1;
            continue;
        }
        if newest_logged.is_some_and(|newest| record.observed_at < newest) {
            out_of_order += 1;
        }
        history.push(record.clone());
        appended += 1;
    }

    let snapshot = derive_snapshot(&history);

    MergeOutcome {
        history,
        snapshot,
        appended,
        duplicates_dropped,
        out_of_order,
    }
}
