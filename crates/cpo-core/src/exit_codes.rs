//! Exit codes for the `cpo-etl` binary.
//!
//! The invoking scheduler reads the outcome from the exit status alone.
//! Values are stable.

use crate::pipeline::{RunReport, RunState};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed; both outputs written
    Clean = 0,

    /// Configuration missing or invalid
    ConfigError = 10,

    /// Remote retrieval failed or timed out
    FetchError = 11,

    /// History or snapshot could not be read or written
    PersistenceError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Classify an error by its code range.
    pub fn from_error(err: &cpo_common::Error) -> Self {
        if err.is_config() {
            ExitCode::ConfigError
        } else if err.is_fetch() {
            ExitCode::FetchError
        } else if err.is_persistence() {
            ExitCode::PersistenceError
        } else {
            ExitCode::InternalError
        }
    }

    pub fn from_report(report: &RunReport) -> Self {
        match (report.state, &report.error) {
            (RunState::Done, _) => ExitCode::Clean,
            (_, Some(err)) => Self::from_error(err),
            // A report that neither finished nor carries an error.
            (_, None) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
