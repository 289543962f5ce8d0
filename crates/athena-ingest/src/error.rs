//! Ingestion error types
//!
//! The taxonomy mirrors how failures are handled:
//!
//! - [`IngestError::Decode`] is recoverable: the record is skipped and
//!   counted, and loading continues until the fail-fast threshold.
//! - [`IngestError::Storage`] always fails the file, because a failed
//!   insert or control update leaves batch atomicity uncertain.
//! - [`IngestError::ClaimConflict`] aborts before any control mutation.
//! - [`IngestError::Orchestration`] covers threshold escalation,
//!   unreadable input, and post-commit archival failures.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Ingestion engine error type
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Decode error at line {line}: {reason}")]
    Decode { line: u64, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("File {file_path} is already claimed by another worker")]
    ClaimConflict { file_path: String },

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Athena error: {0}")]
    Common(#[from] athena_common::AthenaError),
}

impl IngestError {
    /// Build a decode error for one malformed record
    pub fn decode(line: u64, reason: impl Into<String>) -> Self {
        IngestError::Decode {
            line,
            reason: reason.into(),
        }
    }

    /// Whether this failure is a skippable single-record problem
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IngestError::Decode { .. })
    }
}
