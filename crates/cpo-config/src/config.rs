//! ETL configuration types.

use std::path::PathBuf;
use std::time::Duration;

use cpo_common::SiteId;
use serde::{Deserialize, Serialize};

use crate::capacity::{CapacityReference, SiteCapacity};
use crate::load::ConfigError;
use crate::CONFIG_SCHEMA_VERSION;

/// Default availability endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://at.govt.nz/umbraco/Surface/ParkingAvailabilitySurface/ParkingAvailabilityResult";

/// Default bound on the single blocking retrieval.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Complete ETL configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Capacity reference entries (`[[capacity]]` tables).
    #[serde(default, rename = "capacity")]
    pub capacities: Vec<SiteCapacity>,
}

/// Remote source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_category")]
    pub category: String,

    /// Site ids requested from the source.
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteId>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_referer")]
    pub referer: Option<String>,
}

/// Output file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_history_file")]
    pub history_file: String,

    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Keep a copy of every fetched payload under `<data_dir>/raw`.
    #[serde(default)]
    pub archive_raw: bool,
}

fn default_schema_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_category() -> String {
    "short-term".to_string()
}

fn default_sites() -> Vec<SiteId> {
    ["civic", "downtown", "victoria st"]
        .into_iter()
        .map(SiteId::from)
        .collect()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; CarparkAnalytics/1.0)".to_string()
}

fn default_referer() -> Option<String> {
    Some("https://at.govt.nz/parking/".to_string())
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_history_file() -> String {
    "history.jsonl".to_string()
}

fn default_snapshot_file() -> String {
    "latest.json".to_string()
}

fn default_capacities() -> Vec<SiteCapacity> {
    vec![
        SiteCapacity::new("civic", "Civic", 928),
        SiteCapacity::new("downtown", "Downtown", 1944),
        SiteCapacity::new("victoria st", "Victoria Street", 827).with_aliases(&["Victoria St"]),
    ]
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            category: default_category(),
            sites: default_sites(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            referer: default_referer(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_file: default_history_file(),
            snapshot_file: default_snapshot_file(),
            archive_raw: false,
        }
    }
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            capacities: default_capacities(),
        }
    }
}

impl EtlConfig {
    /// Build the immutable capacity reference for this run.
    pub fn capacity_reference(&self) -> Result<CapacityReference, ConfigError> {
        CapacityReference::from_entries(self.capacities.clone())
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StorageConfig {
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }
}
