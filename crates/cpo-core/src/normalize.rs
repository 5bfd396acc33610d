//! Normalizer: reconcile raw readings with the capacity reference.
//!
//! Pure function of its inputs. Data-quality problems are returned as
//! warnings for the driver to log; they never fail the run. The driver also
//! files the fetcher's unreadable rows under the same warning type.

use std::fmt;

use cpo_common::{NormalizedRecord, RawReading, SiteId};
use cpo_config::CapacityReference;
use serde::Serialize;

/// Non-fatal data-quality event raised while fetching or normalizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// Reading for a site missing from the capacity reference; dropped.
    UnknownSite { site_id: SiteId },
    /// Source reported more free spaces than the site has; clamped.
    OverReported {
        site_id: SiteId,
        available: u32,
        total: u32,
    },
    /// Site listed by the source without a numeric availability; no reading.
    UnreadableAvailability { site_id: SiteId },
}

impl DataQualityWarning {
    pub fn site_id(&self) -> &SiteId {
        match self {
            Self::UnknownSite { site_id }
            | Self::OverReported { site_id, .. }
            | Self::UnreadableAvailability { site_id } => site_id,
        }
    }

    /// Whether the reading was dropped rather than corrected.
    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            Self::UnknownSite { .. } | Self::UnreadableAvailability { .. }
        )
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSite { site_id } => {
                write!(f, "no capacity for site '{site_id}', reading dropped")
            }
            Self::OverReported {
                site_id,
                available,
                total,
            } => write!(
                f,
                "site '{site_id}' reported {available} available of {total}, clamped"
            ),
            Self::UnreadableAvailability { site_id } => {
                write!(f, "site '{site_id}' listed without a numeric availability, no reading")
            }
        }
    }
}

/// Normalized records plus the warnings raised producing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    /// In input order.
    pub records: Vec<NormalizedRecord>,
    pub warnings: Vec<DataQualityWarning>,
}

impl NormalizeOutcome {
    pub fn dropped_count(&self) -> usize {
        self.warnings.iter().filter(|w| w.is_drop()).count()
    }

    pub fn dropped_sites(&self) -> Vec<&SiteId> {
        self.warnings
            .iter()
            .filter(|w| w.is_drop())
            .map(DataQualityWarning::site_id)
            .collect()
    }
}

/// Map readings onto the capacity reference.
pub fn normalize(readings: &[RawReading], capacities: &CapacityReference) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();

    for reading in readings {
        let Some(capacity) = capacities.get(&reading.site_id) else {
            outcome.warnings.push(DataQualityWarning::UnknownSite {
                site_id: reading.site_id.clone(),
            });
            continue;
        };

        let total = capacity.total_spaces;
        if reading.available_spaces > total {
            outcome.warnings.push(DataQualityWarning::OverReported {
                site_id: reading.site_id.clone(),
                available: reading.available_spaces,
                total,
            });
        }

        let available = reading.available_spaces.min(total);
        let occupied = total - available;

        outcome.records.push(NormalizedRecord {
            site_id: reading.site_id.clone(),
            display_name: capacity.display_name.clone(),
            total_spaces: total,
            available_spaces: available,
            occupied_spaces: occupied,
            occupancy_pct: occupancy_pct(occupied, total),
            observed_at: reading.observed_at,
        });
    }

    outcome
}

/// `occupied / total × 100`, rounded to two decimals and bounded to
/// `[0, 100]`. A zero total yields 0.
pub fn occupancy_pct(occupied: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = f64::from(occupied.min(total)) / f64::from(total) * 100.0;
    ((pct * 100.0).round() / 100.0).clamp(0.0, 100.0)
}
