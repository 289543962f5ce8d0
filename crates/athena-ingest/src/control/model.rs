//! Control-table models
//!
//! One `file_processing_control` row tracks one ingestion attempt of one
//! file: identity, progress counters, terminal state, and where the file
//! lives now. Rows are never deleted; they are the audit trail.

use athena_common::AthenaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::FileKind;

/// Audit user recorded on engine-driven mutations
pub const SYSTEM_USER: &str = "SYSTEM";

/// Lifecycle status of a control record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "PENDING",
            FileStatus::InProgress => "IN_PROGRESS",
            FileStatus::Completed => "COMPLETED",
            FileStatus::Failed => "FAILED",
        }
    }

    /// Whether this status ends a run (the record may still be re-claimed
    /// from FAILED by a retry)
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Failed)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FileStatus {
    type Err = AthenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(FileStatus::Pending),
            "IN_PROGRESS" => Ok(FileStatus::InProgress),
            "COMPLETED" => Ok(FileStatus::Completed),
            "FAILED" => Ok(FileStatus::Failed),
            _ => Err(AthenaError::Parse(format!("Invalid file status: {}", s))),
        }
    }
}

impl TryFrom<String> for FileStatus {
    type Error = AthenaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One ingestion attempt of one file
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FileProcessingControl {
    pub id: i64,
    /// Logical run identifier, stable across retries of the same lineage;
    /// doubles as the `load_batch_no` stamped on staged rows
    pub process_id: String,
    /// Optional external file identifier
    pub file_id: Option<String>,
    pub file_name: String,
    pub file_path: String,
    pub target_table: String,
    #[sqlx(try_from = "String")]
    pub status: FileStatus,
    pub total_rows: Option<i64>,
    pub loaded_rows: i64,
    pub current_batch: i32,
    pub error_message: Option<String>,
    /// Where the file currently sits
    pub file_location: Option<String>,
    /// Where the file goes (went) after a successful load
    pub archive_location: Option<String>,
    pub created_date: DateTime<Utc>,
    pub created_by: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

impl FileProcessingControl {
    /// Record kind parsed from the target table name
    pub fn kind(&self) -> anyhow::Result<FileKind> {
        self.target_table.parse()
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == FileStatus::InProgress
    }

    pub fn is_completed(&self) -> bool {
        self.status == FileStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == FileStatus::Failed
    }

    /// Data is durable but the source file has not reached the archive yet
    pub fn archival_pending(&self) -> bool {
        self.status == FileStatus::Completed
            && self.archive_location.is_some()
            && self.file_location != self.archive_location
    }
}
