//! Pipeline driver: sequence Fetch → Normalize → Merge and report the outcome.
//!
//! A run reaches `Done` only after the history log and the snapshot are both
//! durable. Any failure leaves the previous files in place.

pub mod typestate;

use chrono::{DateTime, Utc};
use cpo_common::RunId;
use cpo_config::{CapacityReference, EtlConfig};
use cpo_history::{merge, HistoryStore};
use tracing::{error, info, info_span, warn};

use crate::fetch::{AvailabilitySource, Fetcher};
use crate::normalize::{normalize, DataQualityWarning};

pub use typestate::{PipelineRun, RunData, RunPhase, RunState};

/// Summary of one run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    /// Phase the run failed in.
    pub failed_in: Option<RunState>,
    pub readings_fetched: usize,
    pub records_normalized: usize,
    pub warnings: Vec<DataQualityWarning>,
    pub appended: usize,
    pub duplicates_dropped: usize,
    pub history_written: bool,
    pub history_len: usize,
    pub error: Option<cpo_common::Error>,
}

impl RunReport {
    fn new(data: &RunData) -> Self {
        Self {
            run_id: data.run_id.clone(),
            started_at: data.started_at,
            state: RunState::Idle,
            failed_in: None,
            readings_fetched: 0,
            records_normalized: 0,
            warnings: Vec::new(),
            appended: 0,
            duplicates_dropped: 0,
            history_written: false,
            history_len: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    fn failed(mut self, run: PipelineRun<typestate::Failed>, err: cpo_common::Error) -> Self {
        error!(
            run_id = %self.run_id,
            phase = ?run.failed_in(),
            code = err.code(),
            error = %err,
            "run failed"
        );
        self.state = run.state();
        self.failed_in = run.failed_in();
        self.error = Some(err);
        self
    }

    /// Emit the run summary as one structured event.
    pub fn log(&self) {
        let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
        info!(
            run_id = %self.run_id,
            state = %self.state,
            elapsed_ms,
            readings = self.readings_fetched,
            normalized = self.records_normalized,
            warnings = self.warnings.len(),
            appended = self.appended,
            duplicates = self.duplicates_dropped,
            history_len = self.history_len,
            "run summary"
        );
    }
}

/// Drives one ETL run against a source and the configured storage.
pub struct Pipeline<'a, S: AvailabilitySource> {
    config: &'a EtlConfig,
    capacities: &'a CapacityReference,
    source: &'a S,
    store: HistoryStore,
}

impl<'a, S: AvailabilitySource> Pipeline<'a, S> {
    pub fn new(config: &'a EtlConfig, capacities: &'a CapacityReference, source: &'a S) -> Self {
        let store = HistoryStore::new(config.storage.history_path(), config.storage.snapshot_path());
        Self {
            config,
            capacities,
            source,
            store,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Execute one run. Never panics on data or I/O problems; failures are
    /// carried in the returned report.
    pub fn run(&self) -> RunReport {
        let run = PipelineRun::new(RunId::new());
        let span = info_span!("etl_run", run_id = %run.run_id());
        let _enter = span.enter();
        let mut report = RunReport::new(run.data());

        // Fetching
        let run = run.start_fetch();
        report.state = run.state();
        let sites = &self.config.source.sites;
        let mut fetcher = Fetcher::new(self.source, self.capacities);
        if self.config.storage.archive_raw {
            fetcher = fetcher.with_archive(self.config.storage.raw_dir());
        }
        let fetched = match fetcher.fetch_outcome(sites) {
            Ok(fetched) => fetched,
            Err(err) => {
                let run = run.fail();
                return report.failed(run, err.into());
            }
        };
        let readings = fetched.readings;
        report.readings_fetched = readings.len();
        report.warnings.extend(
            fetched
                .unreadable
                .into_iter()
                .map(|site_id| DataQualityWarning::UnreadableAvailability { site_id }),
        );
        if readings.is_empty() {
            warn!(sites = sites.len(), "source returned no readings for configured sites");
        }

        // Normalizing
        let run = run.finish_fetch();
        report.state = run.state();
        let normalized = normalize(&readings, self.capacities);
        report.records_normalized = normalized.records.len();
        report.warnings.extend(normalized.warnings);
        for warning in &report.warnings {
            warn!(site = %warning.site_id(), warning = %warning, "data quality");
        }

        // Merging
        let run = run.finish_normalize();
        report.state = run.state();
        let prior = match self.store.load_history() {
            Ok(prior) => prior,
            Err(err) => {
                let run = run.fail();
                return report.failed(run, err.into());
            }
        };
        if !self.store.snapshot_is_current(&prior.records) {
            warn!(path = %self.store.snapshot_path().display(), "snapshot stale, rebuilding from history");
        }

        let outcome = merge(&normalized.records, &prior.records);
        report.appended = outcome.appended;
        report.duplicates_dropped = outcome.duplicates_dropped;
        if outcome.out_of_order > 0 {
            warn!(count = outcome.out_of_order, "appended records older than newest logged entry");
        }

        match self.store.persist(&prior, &outcome, Utc::now()) {
            Ok(persisted) => {
                report.history_written = persisted.history_written;
                report.history_len = persisted.history_len;
            }
            Err(err) => {
                let run = run.fail();
                return report.failed(run, err.into());
            }
        }

        let done = run.complete();
        report.state = done.state();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchedPayload};
    use cpo_common::SiteId;
    use cpo_config::{SiteCapacity, StorageConfig};
    use tempfile::TempDir;

    struct CannedSource(&'static str);

    impl AvailabilitySource for CannedSource {
        fn retrieve(&self, _site_ids: &[SiteId]) -> Result<FetchedPayload, FetchError> {
            Ok(FetchedPayload {
                body: self.0.to_string(),
                content_type: None,
            })
        }
    }

    fn setup(dir: &TempDir) -> (EtlConfig, CapacityReference) {
        let mut config = EtlConfig {
            storage: StorageConfig {
                data_dir: dir.path().to_path_buf(),
                ..StorageConfig::default()
            },
            ..EtlConfig::default()
        };
        config.source.sites = vec![SiteId::new("civic"), SiteId::new("downtown")];
        config.capacities = vec![
            SiteCapacity::new("civic", "Civic", 200),
            SiteCapacity::new("downtown", "Downtown", 100),
        ];
        let caps = config.capacity_reference().unwrap();
        (config, caps)
    }

    #[test]
    fn test_successful_run_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let (config, caps) = setup(&dir);
        let source = CannedSource(
            r#"[{"carParkName": "Civic", "availableSpaces": 50},
                {"carParkName": "Downtown", "availableSpaces": 120}]"#,
        );

        let report = Pipeline::new(&config, &caps, &source).run();
        assert!(report.is_success(), "{:?}", report.error_message());
        assert_eq!(report.readings_fetched, 2);
        assert_eq!(report.records_normalized, 2);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.appended, 2);
        assert!(report.history_written);
        assert!(config.storage.history_path().exists());
        assert!(config.storage.snapshot_path().exists());
    }

    #[test]
    fn test_unreadable_availability_is_reported() {
        let dir = TempDir::new().unwrap();
        let (config, caps) = setup(&dir);
        let source = CannedSource(
            r#"[{"carParkName": "Civic", "availableSpaces": "n/a"},
                {"carParkName": "Downtown", "availableSpaces": 40}]"#,
        );

        let report = Pipeline::new(&config, &caps, &source).run();
        assert!(report.is_success(), "{:?}", report.error_message());
        assert_eq!(report.readings_fetched, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(
            report.warnings,
            vec![DataQualityWarning::UnreadableAvailability {
                site_id: SiteId::new("civic")
            }]
        );
    }

    #[test]
    fn test_malformed_payload_fails_in_fetching() {
        let dir = TempDir::new().unwrap();
        let (config, caps) = setup(&dir);
        let source = CannedSource("<html>upstream error</html>");

        let report = Pipeline::new(&config, &caps, &source).run();
        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.failed_in, Some(RunState::Fetching));
        assert!(report.error.as_ref().unwrap().is_fetch());
        assert!(!config.storage.history_path().exists());
        assert!(!config.storage.snapshot_path().exists());
    }

    #[test]
    fn test_empty_payload_completes_without_appending() {
        let dir = TempDir::new().unwrap();
        let (config, caps) = setup(&dir);
        let source = CannedSource("[]");

        let report = Pipeline::new(&config, &caps, &source).run();
        assert!(report.is_success());
        assert_eq!(report.appended, 0);
        assert!(!report.history_written);
        assert!(!config.storage.history_path().exists());
        assert!(config.storage.snapshot_path().exists());
    }

    #[test]
    fn test_corrupt_history_fails_in_merging() {
        let dir = TempDir::new().unwrap();
        let (config, caps) = setup(&dir);
        std::fs::write(config.storage.history_path(), "not json\n").unwrap();
        let source = CannedSource(r#"[{"carParkName": "Civic", "availableSpaces": 50}]"#);

        let report = Pipeline::new(&config, &caps, &source).run();
        assert_eq!(report.failed_in, Some(RunState::Merging));
        assert!(report.error.as_ref().unwrap().is_persistence());
        assert_eq!(
            std::fs::read_to_string(config.storage.history_path()).unwrap(),
            "not json\n"
        );
    }
}
