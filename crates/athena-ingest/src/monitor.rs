//! Operational monitoring queries
//!
//! Read-only views over the control and staging tables for the CLI
//! `status` command and for spot checks after a load. Nothing here is on
//! the engine's write path.

use serde::Serialize;
use sqlx::PgPool;

use crate::control::tracker::CONTROL_COLUMNS;
use crate::control::FileProcessingControl;
use crate::error::IngestResult;
use crate::record::FileKind;

/// Read-only status and count queries
pub struct LoadMonitor {
    pool: PgPool,
}

/// Control records grouped by status
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlSummary {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
}

impl ControlSummary {
    pub fn total(&self) -> i64 {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

/// Progress of one logical run, with its staged row count
#[derive(Debug, Clone, Serialize)]
pub struct ProcessProgress {
    pub control: FileProcessingControl,
    /// Rows in the staging table carrying this run's load_batch_no
    pub staged_rows: i64,
}

impl ProcessProgress {
    /// Percent of known rows loaded
    pub fn completion_percentage(&self) -> f64 {
        match self.control.total_rows {
            Some(total) if total > 0 => {
                (self.control.loaded_rows as f64 / total as f64) * 100.0
            },
            _ => 0.0,
        }
    }
}

impl LoadMonitor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Count control records by status
    pub async fn control_summary(&self) -> IngestResult<ControlSummary> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM file_processing_control
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut summary = ControlSummary::default();
        for (status, count) in rows {
            match status.as_str() {
                "PENDING" => summary.pending = count,
                "IN_PROGRESS" => summary.in_progress = count,
                "COMPLETED" => summary.completed = count,
                "FAILED" => summary.failed = count,
                _ => {},
            }
        }

        Ok(summary)
    }

    /// Most recent control records, newest first
    pub async fn recent_controls(&self, limit: i64) -> IngestResult<Vec<FileProcessingControl>> {
        let sql = format!(
            "SELECT {} FROM file_processing_control ORDER BY id DESC LIMIT $1",
            CONTROL_COLUMNS
        );
        let controls = sqlx::query_as::<_, FileProcessingControl>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(controls)
    }

    /// Rows staged under one load_batch_no in one staging table
    pub async fn staged_row_count(
        &self,
        kind: FileKind,
        load_batch_no: &str,
    ) -> IngestResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE load_batch_no = $1",
            kind.table()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(load_batch_no)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Progress of the run identified by process_id (newest attempt)
    pub async fn process_progress(
        &self,
        process_id: &str,
    ) -> IngestResult<Option<ProcessProgress>> {
        let sql = format!(
            "SELECT {} FROM file_processing_control \
             WHERE process_id = $1 ORDER BY id DESC LIMIT 1",
            CONTROL_COLUMNS
        );
        let control = sqlx::query_as::<_, FileProcessingControl>(&sql)
            .bind(process_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(control) = control else {
            return Ok(None);
        };

        let staged_rows = match control.kind() {
            Ok(kind) => self.staged_row_count(kind, process_id).await?,
            Err(_) => 0,
        };

        Ok(Some(ProcessProgress {
            control,
            staged_rows,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{FileStatus, SYSTEM_USER};
    use chrono::Utc;

    fn progress(loaded: i64, total: Option<i64>) -> ProcessProgress {
        ProcessProgress {
            control: FileProcessingControl {
                id: 1,
                process_id: "p1".to_string(),
                file_id: None,
                file_name: "f.csv".to_string(),
                file_path: "/in/f.csv".to_string(),
                target_table: "ams_header_load".to_string(),
                status: FileStatus::InProgress,
                total_rows: total,
                loaded_rows: loaded,
                current_batch: 1,
                error_message: None,
                file_location: Some("/in/f.csv".to_string()),
                archive_location: None,
                created_date: Utc::now(),
                created_by: Some(SYSTEM_USER.to_string()),
                modified_date: None,
                modified_by: None,
            },
            staged_rows: loaded,
        }
    }

    #[test]
    fn test_completion_percentage() {
        assert_eq!(progress(50, Some(200)).completion_percentage(), 25.0);
        assert_eq!(progress(0, None).completion_percentage(), 0.0);
        assert_eq!(progress(0, Some(0)).completion_percentage(), 0.0);
    }

    #[test]
    fn test_control_summary_total() {
        let summary = ControlSummary {
            pending: 1,
            in_progress: 2,
            completed: 3,
            failed: 4,
        };
        assert_eq!(summary.total(), 10);
    }
}
