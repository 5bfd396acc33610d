//! Durable history and snapshot files.
//!
//! The history log is JSONL (one record per line) and the snapshot a single
//! JSON document. Both are written to a temporary file in the target
//! directory, synced, then renamed over the target, so readers only ever see
//! the previous or the next complete file.
//!
//! History is written before the snapshot. If the snapshot write fails the
//! previous history content is put back, leaving both files as they were.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cpo_common::schema::is_compatible;
use cpo_common::HistoryRecord;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::merge::MergeOutcome;
use crate::snapshot::{derive_snapshot, SnapshotDocument};

/// Errors from history storage.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt entry at {path}:{line}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("merge result does not extend the loaded history ({prior} loaded, {merged} merged)")]
    NotAnAppend { prior: usize, merged: usize },

    #[error("snapshot write failed ({cause}) and history rollback failed: {rollback}")]
    Rollback { cause: String, rollback: String },
}

impl From<HistoryError> for cpo_common::Error {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Corrupt { .. } => cpo_common::Error::HistoryCorrupted(err.to_string()),
            other => cpo_common::Error::Persistence(other.to_string()),
        }
    }
}

/// History as read from disk, with the exact bytes kept for rollback.
#[derive(Debug, Clone, Default)]
pub struct LoadedHistory {
    pub records: Vec<HistoryRecord>,
    raw: Option<Vec<u8>>,
}

impl LoadedHistory {
    /// Whether the log file existed.
    pub fn existed(&self) -> bool {
        self.raw.is_some()
    }
}

/// What `persist` actually wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    pub history_written: bool,
    pub snapshot_written: bool,
    pub history_len: usize,
}

/// History log and snapshot file pair.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    history_path: PathBuf,
    snapshot_path: PathBuf,
}

impl HistoryStore {
    pub fn new(history_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Read the full history log. A missing file is an empty log.
    pub fn load_history(&self) -> Result<LoadedHistory, HistoryError> {
        if !self.history_path.exists() {
            return Ok(LoadedHistory::default());
        }

        let raw = fs::read(&self.history_path).map_err(|e| self.io_err(&self.history_path, e))?;

        // Parsed from bytes so invalid UTF-8 is a corrupt line, not a
        // silently substituted character.
        let mut records = Vec::new();
        for (idx, line) in raw.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record: HistoryRecord =
                serde_json::from_slice(line).map_err(|source| HistoryError::Corrupt {
                    path: self.history_path.clone(),
                    line: idx + 1,
                    source,
                })?;
            records.push(record);
        }

        debug!(path = %self.history_path.display(), entries = records.len(), "history loaded");
        Ok(LoadedHistory {
            records,
            raw: Some(raw),
        })
    }

    /// Read the snapshot document, if present and of a compatible schema.
    pub fn load_snapshot(&self) -> Result<Option<SnapshotDocument>, HistoryError> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&self.snapshot_path).map_err(|e| self.io_err(&self.snapshot_path, e))?;
        let doc: SnapshotDocument =
            serde_json::from_str(&content).map_err(|source| HistoryError::Corrupt {
                path: self.snapshot_path.clone(),
                line: 1,
                source,
            })?;

        if !is_compatible(&doc.schema_version) {
            warn!(
                path = %self.snapshot_path.display(),
                schema_version = %doc.schema_version,
                "ignoring snapshot with incompatible schema"
            );
            return Ok(None);
        }
        Ok(Some(doc))
    }

    /// Whether the snapshot on disk matches the one derived from `history`.
    pub fn snapshot_is_current(&self, history: &[HistoryRecord]) -> bool {
        match self.load_snapshot() {
            Ok(Some(doc)) => doc.to_snapshot() == derive_snapshot(history),
            Ok(None) => history.is_empty(),
            Err(_) => false,
        }
    }

    /// Persist a merge result: history first (skipped for a no-op merge),
    /// then the snapshot.
    ///
    /// Existing history bytes are carried over verbatim; only the appended
    /// records are encoded.
    pub fn persist(
        &self,
        prior: &LoadedHistory,
        outcome: &MergeOutcome,
        generated_at: DateTime<Utc>,
    ) -> Result<PersistReport, HistoryError> {
        let history_written = !outcome.is_noop();
        if history_written {
            let bytes = append_history(prior, outcome)?;
            write_atomic(&self.history_path, &bytes)?;
            info!(
                path = %self.history_path.display(),
                appended = outcome.appended,
                total = outcome.history.len(),
                "history written"
            );
        }

        let doc = SnapshotDocument::new(&outcome.snapshot, generated_at);
        let snapshot_result = serde_json::to_vec_pretty(&doc)
            .map_err(|source| HistoryError::Json { source })
            .and_then(|bytes| write_atomic(&self.snapshot_path, &bytes));

        if let Err(err) = snapshot_result {
            if history_written {
                self.restore_history(prior).map_err(|rollback| HistoryError::Rollback {
                    cause: err.to_string(),
                    rollback: rollback.to_string(),
                })?;
            }
            return Err(err);
        }

        debug!(path = %self.snapshot_path.display(), sites = doc.records.len(), "snapshot written");
        Ok(PersistReport {
            history_written,
            snapshot_written: true,
            history_len: outcome.history.len(),
        })
    }

    fn restore_history(&self, prior: &LoadedHistory) -> Result<(), HistoryError> {
        warn!(path = %self.history_path.display(), "restoring previous history");
        let restored = match &prior.raw {
            Some(bytes) => write_atomic(&self.history_path, bytes),
            None => fs::remove_file(&self.history_path).map_err(|e| self.io_err(&self.history_path, e)),
        };
        if let Err(ref e) = restored {
            error!(path = %self.history_path.display(), error = %e, "history rollback failed");
        }
        restored
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Prior file bytes followed by the records the merge appended.
fn append_history(prior: &LoadedHistory, outcome: &MergeOutcome) -> Result<Vec<u8>, HistoryError> {
    let appended = outcome
        .history
        .get(prior.records.len()..)
        .filter(|tail| tail.len() == outcome.appended)
        .ok_or(HistoryError::NotAnAppend {
            prior: prior.records.len(),
            merged: outcome.history.len(),
        })?;

    let mut out = prior.raw.clone().unwrap_or_default();
    if out.last().is_some_and(|b| *b != b'\n') {
        out.push(b'\n');
    }
    out.extend(encode_history(appended)?);
    Ok(out)
}

fn encode_history(records: &[HistoryRecord]) -> Result<Vec<u8>, HistoryError> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record).map_err(|source| HistoryError::Json { source })?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Replace `path` with `bytes` via a synced temporary file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HistoryError> {
    let io_err = |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    #[cfg(unix)]
    {
        if let Err(e) = fs::File::open(&dir).and_then(|d| d.sync_all()) {
            debug!(dir = %dir.display(), error = %e, "directory sync skipped");
        }
    }

    Ok(())
}
