//! Configuration file parsing.
//!
//! Supports TOML and JSON, chosen by file extension.

use std::fs;
use std::path::{Path, PathBuf};

use cpo_common::SiteId;
use thiserror::Error;

use crate::config::EtlConfig;
use crate::validate::{validate, ValidationError};

/// Supported configuration formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// Detect the format from a file extension.
    pub fn detect(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat { extension: ext }),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("failed to parse {format} config: {message}")]
    Parse { format: String, message: String },

    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("duplicate capacity entry for site '{0}'")]
    DuplicateSite(SiteId),

    #[error("site '{0}' has zero total spaces")]
    ZeroCapacity(SiteId),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for cpo_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::DuplicateSite(_) | ConfigError::ZeroCapacity(_) => {
                cpo_common::Error::InvalidCapacity(err.to_string())
            }
            other => cpo_common::Error::Config(other.to_string()),
        }
    }
}

/// Load and validate a configuration file.
pub fn load_config_from_path(path: &Path) -> Result<EtlConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = ConfigFormat::detect(path)?;
    parse_config_str(&content, format)
}

/// Parse and validate configuration from a string.
pub fn parse_config_str(content: &str, format: ConfigFormat) -> Result<EtlConfig, ConfigError> {
    let config: EtlConfig = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::Parse {
            format: format.as_str().to_string(),
            message: e.to_string(),
        })?,
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            format: format.as_str().to_string(),
            message: e.to_string(),
        })?,
    };

    validate(&config).into_result()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[source]
sites = ["civic", "downtown"]
timeout_secs = 5

[storage]
data_dir = "/tmp/cpo"
archive_raw = true

[[capacity]]
site_id = "civic"
display_name = "Civic"
total_spaces = 200

[[capacity]]
site_id = "downtown"
display_name = "Downtown"
total_spaces = 1944
aliases = ["Downtown Carpark"]
"#;

    #[test]
    fn parse_toml_config() {
        let config = parse_config_str(SAMPLE, ConfigFormat::Toml).unwrap();
        assert_eq!(config.source.sites.len(), 2);
        assert_eq!(config.source.timeout_secs, 5);
        assert_eq!(config.source.category, "short-term");
        assert!(config.storage.archive_raw);
        assert_eq!(config.capacities[1].aliases, vec!["Downtown Carpark"]);
    }

    #[test]
    fn parse_json_config() {
        let input = r#"
{
  "source": { "sites": ["civic"] },
  "capacity": [{ "site_id": "civic", "display_name": "Civic", "total_spaces": 200 }]
}
"#;
        let config = parse_config_str(input, ConfigFormat::Json).unwrap();
        assert_eq!(config.capacities.len(), 1);
        assert_eq!(config.storage.history_file, "history.jsonl");
    }

    #[test]
    fn parse_rejects_invalid_values() {
        let input = r#"
[source]
sites = []
timeout_secs = 0
"#;
        let err = parse_config_str(input, ConfigFormat::Toml).unwrap_err();
        match err {
            ConfigError::Invalid(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"source.sites"));
                assert!(fields.contains(&"source.timeout_secs"));
                assert!(fields.contains(&"capacity"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_reports_syntax_errors() {
        let err = parse_config_str("[source", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref format, .. } if format == "toml"));
    }

    #[test]
    fn load_from_path_detects_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cpo.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.capacities.len(), 2);

        let bad = dir.path().join("cpo.ini");
        std::fs::write(&bad, SAMPLE).unwrap();
        assert!(matches!(
            load_config_from_path(&bad),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }
}
