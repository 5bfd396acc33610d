//! Carpark occupancy configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the ETL configuration file
//! - The capacity reference (site id → display name, total spaces)
//! - Config resolution (CLI → env → user config dir → defaults)
//! - Semantic validation

pub mod capacity;
pub mod config;
pub mod load;
pub mod resolve;
pub mod validate;

pub use capacity::{CapacityReference, SiteCapacity};
pub use config::{EtlConfig, SourceConfig, StorageConfig};
pub use load::{load_config_from_path, parse_config_str, ConfigError, ConfigFormat};
pub use resolve::{resolve_config, resolve_with, ConfigOrigin, ResolvedConfig};
pub use validate::{validate, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
