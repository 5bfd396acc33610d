//! Error types for the carpark occupancy ETL.

use thiserror::Error;

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type surfaced to the invoking scheduler.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid capacity reference: {0}")]
    InvalidCapacity(String),

    // Fetch errors (20-29)
    #[error("fetch failed for [{scope}]: {message}")]
    Fetch { scope: String, message: String },

    #[error("fetch for [{scope}] timed out after {seconds}s")]
    FetchTimeout { scope: String, seconds: u64 },

    #[error("malformed response for [{scope}]: {message}")]
    MalformedResponse { scope: String, message: String },

    // Persistence errors (60-69)
    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("history log corrupted: {0}")]
    HistoryCorrupted(String),

    // Internal errors (90-99)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON log output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidCapacity(_) => 11,
            Error::Fetch { .. } => 20,
            Error::FetchTimeout { .. } => 21,
            Error::MalformedResponse { .. } => 22,
            Error::Persistence(_) => 60,
            Error::HistoryCorrupted(_) => 61,
            Error::Internal(_) => 90,
        }
    }

    /// Errors raised while retrieving the remote payload.
    pub fn is_fetch(&self) -> bool {
        (20..30).contains(&self.code())
    }

    pub fn is_persistence(&self) -> bool {
        (60..70).contains(&self.code())
    }

    pub fn is_config(&self) -> bool {
        (10..20).contains(&self.code())
    }
}
