//! Fetcher: one retrieval per run, decoded into raw readings.
//!
//! The remote wire format lives in [`payload`]; transport lives behind
//! [`AvailabilitySource`] so the pipeline can run against a fake source.

pub mod html;
pub mod http;
pub mod payload;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cpo_common::{fold_name, RawReading, SiteId};
use cpo_config::CapacityReference;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use http::HttpSource;
pub use payload::{PayloadFormat, PayloadRow};

/// Errors from retrieving or decoding the remote payload.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure for [{scope}]: {message}")]
    Transport { scope: String, message: String },

    #[error("request for [{scope}] timed out after {seconds}s")]
    Timeout { scope: String, seconds: u64 },

    #[error("HTTP {status} for [{scope}]")]
    Status { scope: String, status: u16 },

    #[error("failed to read response body for [{scope}]: {source}")]
    Body {
        scope: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unparseable payload for [{scope}]: {message}")]
    Malformed { scope: String, message: String },
}

impl From<FetchError> for cpo_common::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { scope, seconds } => {
                cpo_common::Error::FetchTimeout { scope, seconds }
            }
            FetchError::Malformed { scope, message } => {
                cpo_common::Error::MalformedResponse { scope, message }
            }
            FetchError::Transport { ref scope, .. }
            | FetchError::Status { ref scope, .. }
            | FetchError::Body { ref scope, .. } => cpo_common::Error::Fetch {
                scope: scope.clone(),
                message: err.to_string(),
            },
        }
    }
}

/// Human-readable site scope carried by fetch errors.
pub fn scope_of(site_ids: &[SiteId]) -> String {
    site_ids
        .iter()
        .map(SiteId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Body and content type of one successful retrieval.
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub body: String,
    pub content_type: Option<String>,
}

/// A remote endpoint that reports availability for a set of sites.
pub trait AvailabilitySource {
    /// Perform the single blocking retrieval for `site_ids`.
    fn retrieve(&self, site_ids: &[SiteId]) -> Result<FetchedPayload, FetchError>;
}

/// Resolves payload names to configured site ids.
///
/// Configured ids match directly; display names and aliases go through the
/// capacity reference and count only when they land on a configured id.
#[derive(Debug, Clone)]
pub struct SiteMatcher<'a> {
    ids: HashMap<String, &'a SiteId>,
    capacities: &'a CapacityReference,
}

impl<'a> SiteMatcher<'a> {
    pub fn new(site_ids: &'a [SiteId], capacities: &'a CapacityReference) -> Self {
        let ids = site_ids.iter().map(|id| (id.folded(), id)).collect();
        Self { ids, capacities }
    }

    pub fn resolve(&self, name: &str) -> Option<&'a SiteId> {
        if let Some(id) = self.ids.get(&fold_name(name)) {
            return Some(*id);
        }
        self.capacities
            .resolve_name(name)
            .filter(|id| self.ids.contains_key(&id.folded()))
    }
}

/// Readings decoded from one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub readings: Vec<RawReading>,
    /// Configured sites present in the payload only with a non-numeric
    /// availability. They have no reading.
    pub unreadable: Vec<SiteId>,
}

/// Turn decoded rows into at most one reading per configured site.
///
/// Rows for unconfigured carparks, rows without a numeric availability and
/// repeated rows for a site already read are skipped.
pub fn readings_from_rows(
    rows: &[PayloadRow],
    matcher: &SiteMatcher<'_>,
    observed_at: DateTime<Utc>,
) -> FetchOutcome {
    let mut seen = HashSet::new();
    let mut outcome = FetchOutcome::default();

    for row in rows {
        let Some(site_id) = matcher.resolve(&row.name) else {
            debug!(carpark = %row.name, "skipping unconfigured carpark");
            continue;
        };
        let Some(available) = row.available else {
            warn!(site = %site_id, carpark = %row.name, "availability missing or not numeric");
            if !outcome.unreadable.contains(site_id) {
                outcome.unreadable.push(site_id.clone());
            }
            continue;
        };
        if !seen.insert(site_id) {
            debug!(site = %site_id, category = ?row.category, "skipping repeated row");
            continue;
        }
        outcome.readings.push(RawReading {
            site_id: site_id.clone(),
            available_spaces: available,
            observed_at,
            category: row.category.clone(),
        });
    }

    // A later readable row for the same site supersedes an unreadable one.
    outcome.unreadable.retain(|id| !seen.contains(id));
    outcome
}

/// Fetches and decodes availability readings for the configured sites.
pub struct Fetcher<'a, S: AvailabilitySource> {
    source: &'a S,
    capacities: &'a CapacityReference,
    archive_dir: Option<PathBuf>,
}

impl<'a, S: AvailabilitySource> Fetcher<'a, S> {
    pub fn new(source: &'a S, capacities: &'a CapacityReference) -> Self {
        Self {
            source,
            capacities,
            archive_dir: None,
        }
    }

    /// Keep a copy of each raw payload in `dir`.
    pub fn with_archive(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Retrieve once and return a reading for every configured site present
    /// in the response. `observed_at` is the local time of retrieval.
    pub fn fetch(&self, site_ids: &[SiteId]) -> Result<Vec<RawReading>, FetchError> {
        self.fetch_outcome(site_ids).map(|outcome| outcome.readings)
    }

    /// Like [`Fetcher::fetch`], also naming the sites whose rows were unreadable.
    pub fn fetch_outcome(&self, site_ids: &[SiteId]) -> Result<FetchOutcome, FetchError> {
        let payload = self.source.retrieve(site_ids)?;
        let observed_at = Utc::now();

        let (format, rows) = payload::decode(&payload.body).map_err(|message| FetchError::Malformed {
            scope: scope_of(site_ids),
            message,
        })?;
        debug!(?format, rows = rows.len(), content_type = ?payload.content_type, "payload decoded");

        if let Some(dir) = &self.archive_dir {
            self.archive(dir, &payload.body, format, observed_at);
        }

        let matcher = SiteMatcher::new(site_ids, self.capacities);
        let outcome = readings_from_rows(&rows, &matcher, observed_at);
        info!(
            requested = site_ids.len(),
            readings = outcome.readings.len(),
            unreadable = outcome.unreadable.len(),
            observed_at = %observed_at.to_rfc3339(),
            "fetch complete"
        );
        Ok(outcome)
    }

    fn archive(&self, dir: &Path, body: &str, format: PayloadFormat, at: DateTime<Utc>) {
        let path = dir.join(format!("raw_{}.{}", at.timestamp(), format.extension()));
        let written = fs::create_dir_all(dir).and_then(|_| fs::write(&path, body));
        match written {
            Ok(()) => debug!(path = %path.display(), "raw payload archived"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to archive raw payload"),
        }
    }
}
