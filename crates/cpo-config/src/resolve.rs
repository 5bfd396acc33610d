//! Configuration resolution.
//!
//! Order: explicit path → `CPO_CONFIG` → `<config_dir>/carpark_occupancy/config.toml`
//! → embedded defaults. `CPO_DATA_DIR` overrides `storage.data_dir` whatever
//! the origin.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::capacity::CapacityReference;
use crate::config::EtlConfig;
use crate::load::{load_config_from_path, ConfigError};
use crate::validate::validate;

const ENV_CONFIG: &str = "CPO_CONFIG";
const ENV_DATA_DIR: &str = "CPO_DATA_DIR";
const DIR_NAME: &str = "carpark_occupancy";
const CONFIG_FILE: &str = "config.toml";

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    Explicit(PathBuf),
    Env(PathBuf),
    UserDir(PathBuf),
    Defaults,
}

/// Configuration plus the capacity reference derived from it.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: EtlConfig,
    pub capacities: CapacityReference,
    pub origin: ConfigOrigin,
}

/// Resolve configuration from the process environment.
pub fn resolve_config(explicit: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let env_path = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
    let user_path = dirs::config_dir().map(|d| d.join(DIR_NAME).join(CONFIG_FILE));
    let data_dir = std::env::var_os(ENV_DATA_DIR).map(PathBuf::from);
    resolve_with(explicit, env_path, user_path, data_dir)
}

/// Resolve configuration from explicit inputs.
///
/// An explicit or env path must exist; the user-dir file is optional.
pub fn resolve_with(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    user_path: Option<PathBuf>,
    data_dir_override: Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let (mut config, origin) = if let Some(path) = explicit {
        (
            load_config_from_path(path)?,
            ConfigOrigin::Explicit(path.to_path_buf()),
        )
    } else if let Some(path) = env_path {
        (load_config_from_path(&path)?, ConfigOrigin::Env(path))
    } else if let Some(path) = user_path.filter(|p| p.is_file()) {
        (load_config_from_path(&path)?, ConfigOrigin::UserDir(path))
    } else {
        (EtlConfig::default(), ConfigOrigin::Defaults)
    };

    if let Some(dir) = data_dir_override {
        debug!(data_dir = %dir.display(), "data dir overridden from environment");
        config.storage.data_dir = dir;
        validate(&config).into_result()?;
    }

    let capacities = config.capacity_reference()?;
    info!(
        origin = ?origin,
        sites = config.source.sites.len(),
        capacities = capacities.len(),
        "configuration resolved"
    );

    Ok(ResolvedConfig {
        config,
        capacities,
        origin,
    })
}
