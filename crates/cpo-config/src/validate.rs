//! Semantic validation of a parsed configuration.

use std::collections::HashSet;
use std::fmt;

use cpo_common::schema::same_major;

use crate::config::EtlConfig;
use crate::load::ConfigError;
use crate::CONFIG_SCHEMA_VERSION;

/// One validation failure, keyed by dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All failures found in one pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ConfigError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self.errors))
        }
    }
}

/// Validate a configuration, collecting every violation.
pub fn validate(config: &EtlConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if !same_major(CONFIG_SCHEMA_VERSION, &config.schema_version) {
        errors.push(ValidationError::new(
            "schema_version",
            format!(
                "'{}' is not compatible with supported version {CONFIG_SCHEMA_VERSION}",
                config.schema_version
            ),
        ));
    }

    if config.source.endpoint.trim().is_empty() {
        errors.push(ValidationError::new("source.endpoint", "must not be empty"));
    }
    if config.source.sites.is_empty() {
        errors.push(ValidationError::new(
            "source.sites",
            "at least one site id is required",
        ));
    }
    if config
        .source
        .sites
        .iter()
        .any(|site| site.as_str().trim().is_empty())
    {
        errors.push(ValidationError::new("source.sites", "site ids must not be blank"));
    }
    if config.source.timeout_secs == 0 {
        errors.push(ValidationError::new(
            "source.timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.storage.history_file.trim().is_empty() {
        errors.push(ValidationError::new("storage.history_file", "must not be empty"));
    }
    if config.storage.snapshot_file.trim().is_empty() {
        errors.push(ValidationError::new("storage.snapshot_file", "must not be empty"));
    }
    if config.storage.history_file == config.storage.snapshot_file {
        errors.push(ValidationError::new(
            "storage.snapshot_file",
            "must differ from storage.history_file",
        ));
    }

    if config.capacities.is_empty() {
        errors.push(ValidationError::new(
            "capacity",
            "at least one capacity entry is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, entry) in config.capacities.iter().enumerate() {
        let field = format!("capacity[{idx}]");
        if !seen.insert(&entry.site_id) {
            errors.push(ValidationError::new(
                format!("{field}.site_id"),
                format!("duplicate site id '{}'", entry.site_id),
            ));
        }
        if entry.total_spaces == 0 {
            errors.push(ValidationError::new(
                format!("{field}.total_spaces"),
                "must be greater than zero",
            ));
        }
        if entry.display_name.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{field}.display_name"),
                "must not be empty",
            ));
        }
    }

    ValidationResult { errors }
}
