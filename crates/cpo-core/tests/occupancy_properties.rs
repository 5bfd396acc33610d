//! Property-based tests for normalization and merge invariants.

use chrono::{DateTime, TimeZone, Utc};
use cpo_common::{RawReading, SiteId};
use cpo_config::{CapacityReference, SiteCapacity};
use cpo_core::normalize::{normalize, DataQualityWarning};
use cpo_history::{derive_snapshot, merge};
use proptest::prelude::*;

const SITES: [&str; 3] = ["civic", "downtown", "victoria st"];

fn capacities(totals: &[u32; 3]) -> CapacityReference {
    CapacityReference::from_entries(
        SITES
            .iter()
            .zip(totals)
            .map(|(id, total)| SiteCapacity::new(*id, &id.to_uppercase(), *total))
            .collect(),
    )
    .expect("valid capacities")
}

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(i64::from(minute))
}

/// Readings for known sites plus the occasional unknown one.
fn reading_strategy() -> impl Strategy<Value = RawReading> {
    (0usize..4, 0u32..5_000, 0u32..600).prop_map(|(site, available, minute)| RawReading {
        site_id: SiteId::new(SITES.get(site).copied().unwrap_or("ronwood")),
        available_spaces: available,
        observed_at: at(minute),
        category: None,
    })
}

fn totals_strategy() -> impl Strategy<Value = [u32; 3]> {
    [1u32..3_000, 1u32..3_000, 1u32..3_000]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn occupancy_is_bounded_and_consistent(
        totals in totals_strategy(),
        readings in prop::collection::vec(reading_strategy(), 0..40),
    ) {
        let caps = capacities(&totals);
        let outcome = normalize(&readings, &caps);

        for record in &outcome.records {
            prop_assert!((0.0..=100.0).contains(&record.occupancy_pct), "pct out of range: {}", record.occupancy_pct);
            prop_assert!(record.available_spaces <= record.total_spaces);
            prop_assert_eq!(record.available_spaces + record.occupied_spaces, record.total_spaces);
        }
    }

    #[test]
    fn over_reported_readings_are_empty_carparks(
        totals in totals_strategy(),
        site in 0usize..3,
        excess in 1u32..1_000,
    ) {
        let caps = capacities(&totals);
        let reading = RawReading {
            site_id: SiteId::new(SITES[site]),
            available_spaces: totals[site] + excess,
            observed_at: at(0),
            category: None,
        };
        let outcome = normalize(&[reading], &caps);

        prop_assert_eq!(outcome.records[0].occupied_spaces, 0);
        prop_assert_eq!(outcome.records[0].occupancy_pct, 0.0);
        let is_over_reported = matches!(outcome.warnings.as_slice(), [DataQualityWarning::OverReported { .. }]);
        prop_assert!(is_over_reported);
    }

    #[test]
    fn unknown_sites_are_dropped_and_counted(
        readings in prop::collection::vec(reading_strategy(), 0..40),
    ) {
        let caps = capacities(&[100, 100, 100]);
        let outcome = normalize(&readings, &caps);
        let unknown = readings.iter().filter(|r| r.site_id.as_str() == "ronwood").count();

        prop_assert_eq!(outcome.dropped_count(), unknown);
        prop_assert_eq!(outcome.records.len(), readings.len() - unknown);
        prop_assert!(outcome.records.iter().all(|r| caps.contains(&r.site_id)));
    }

    #[test]
    fn merging_a_batch_twice_is_idempotent(
        existing in prop::collection::vec(reading_strategy(), 0..20),
        batch in prop::collection::vec(reading_strategy(), 0..20),
    ) {
        let caps = capacities(&[500, 500, 500]);
        let history = merge(&normalize(&existing, &caps).records, &[]).history;
        let records = normalize(&batch, &caps).records;

        let once = merge(&records, &history);
        let twice = merge(&records, &once.history);

        prop_assert_eq!(&once.history, &twice.history);
        prop_assert_eq!(twice.appended, 0);
        prop_assert!(twice.is_noop());
    }

    #[test]
    fn merge_snapshot_matches_derivation_from_history(
        existing in prop::collection::vec(reading_strategy(), 0..20),
        batch in prop::collection::vec(reading_strategy(), 0..20),
    ) {
        let caps = capacities(&[800, 800, 800]);
        let history = merge(&normalize(&existing, &caps).records, &[]).history;
        let outcome = merge(&normalize(&batch, &caps).records, &history);

        prop_assert_eq!(derive_snapshot(&outcome.history), outcome.snapshot.clone());
        for (site, latest) in &outcome.snapshot {
            let newest = outcome
                .history
                .iter()
                .filter(|r| &r.site_id == site)
                .map(|r| r.observed_at)
                .max();
            prop_assert_eq!(Some(latest.observed_at), newest);
        }
    }
}
