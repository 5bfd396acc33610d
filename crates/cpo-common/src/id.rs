//! Site and run identity types.
//!
//! A site is identified by the short code the remote source accepts in its
//! `carparkIdParam` query (e.g. `civic`, `victoria st`). Codes are compared
//! exactly; display spellings are matched through [`fold_name`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable short code for one carpark.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub String);

impl SiteId {
    pub fn new(id: impl Into<String>) -> Self {
        SiteId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folded form used to match payload names against this id.
    pub fn folded(&self) -> String {
        fold_name(&self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SiteId {
    fn from(id: &str) -> Self {
        SiteId(id.to_string())
    }
}

/// Run ID for correlating the log lines of one ETL invocation.
///
/// Format: `run-<date>-<time>-<random>`
/// Example: `run-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        RunId(format!("run-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fold a carpark name for comparison: trim, collapse inner whitespace,
/// lowercase.
pub fn fold_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
