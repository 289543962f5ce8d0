//! Progress tracking against `file_processing_control`
//!
//! Every status transition goes through here. The claim is the only
//! contended operation: a partial unique index on
//! `(file_path) WHERE status = 'IN_PROGRESS'` guarantees at most one
//! active worker per file, and a losing claim rolls its transaction back
//! so no control row is left behind.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::model::{FileProcessingControl, FileStatus, SYSTEM_USER};
use crate::error::{IngestError, IngestResult};
use crate::record::FileKind;

pub(crate) const CONTROL_COLUMNS: &str = "id, process_id, file_id, file_name, file_path, target_table, \
     status, total_rows, loaded_rows, current_batch, error_message, \
     file_location, archive_location, created_date, created_by, \
     modified_date, modified_by";

/// Owns the lifecycle of control records
#[derive(Clone)]
pub struct ProgressTracker {
    pool: PgPool,
}

impl ProgressTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Claim a file for processing
    ///
    /// Creates the control record (PENDING) and promotes it to IN_PROGRESS
    /// in one transaction. If another worker already holds the file, the
    /// transaction rolls back and [`IngestError::ClaimConflict`] is
    /// returned without mutating control state.
    pub async fn claim(
        &self,
        file_name: &str,
        file_path: &str,
        kind: FileKind,
        file_id: Option<&str>,
    ) -> IngestResult<FileProcessingControl> {
        let process_id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO file_processing_control (
                process_id, file_id, file_name, file_path, target_table,
                status, file_location, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&process_id)
        .bind(file_id)
        .bind(file_name)
        .bind(file_path)
        .bind(kind.table())
        .bind(FileStatus::Pending.as_str())
        .bind(file_path)
        .bind(SYSTEM_USER)
        .fetch_one(&mut *tx)
        .await?;

        let promoted = sqlx::query(
            r#"
            UPDATE file_processing_control
            SET status = $2, modified_date = now(), modified_by = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(FileStatus::InProgress.as_str())
        .bind(SYSTEM_USER)
        .bind(FileStatus::Pending.as_str())
        .execute(&mut *tx)
        .await;

        match promoted {
            Ok(_) => {
                tx.commit().await?;
                debug!(control_id = id, process_id = %process_id, file = %file_name, "file claimed");
                self.fetch(id).await
            },
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await.ok();
                Err(IngestError::ClaimConflict {
                    file_path: file_path.to_string(),
                })
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Re-claim a FAILED record for retry (FAILED -> IN_PROGRESS)
    ///
    /// Counters are preserved so the run resumes from `current_batch + 1`.
    pub async fn reclaim(&self, id: i64) -> IngestResult<FileProcessingControl> {
        let result = sqlx::query(
            r#"
            UPDATE file_processing_control
            SET status = $2, modified_date = now(), modified_by = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(FileStatus::InProgress.as_str())
        .bind(SYSTEM_USER)
        .bind(FileStatus::Failed.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => self.fetch(id).await,
            Ok(_) => Err(IngestError::Orchestration(format!(
                "control record {} is not FAILED and cannot be re-claimed",
                id
            ))),
            Err(e) if is_unique_violation(&e) => {
                let existing = self.fetch(id).await?;
                Err(IngestError::ClaimConflict {
                    file_path: existing.file_path,
                })
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Reset counters for a from-scratch reload of a FAILED record
    ///
    /// Issues a fresh process_id so the new rows' `load_batch_no` does not
    /// collide with rows staged by the failed lineage.
    pub async fn reset_for_reload(&self, id: i64) -> IngestResult<FileProcessingControl> {
        let process_id = Uuid::new_v4().to_string();

        let done = sqlx::query(
            r#"
            UPDATE file_processing_control
            SET process_id = $2, loaded_rows = 0, current_batch = 0,
                modified_date = now(), modified_by = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id)
        .bind(&process_id)
        .bind(SYSTEM_USER)
        .bind(FileStatus::Failed.as_str())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() != 1 {
            return Err(IngestError::Orchestration(format!(
                "control record {} is not FAILED and cannot be reset",
                id
            )));
        }

        self.fetch(id).await
    }

    /// Record the file's row count as soon as it is known
    pub async fn set_total_rows(&self, id: i64, total_rows: i64) -> IngestResult<()> {
        sqlx::query(
            r#"
            UPDATE file_processing_control
            SET total_rows = $2, modified_date = now(), modified_by = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(total_rows)
        .bind(SYSTEM_USER)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Advance progress after a batch's staging writes, inside the same
    /// transaction as those writes
    ///
    /// The shared transaction is what makes a batch and its progress
    /// update one recoverable unit: either both commit or neither does.
    pub async fn record_batch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        batch_number: u32,
        rows_written: u64,
    ) -> IngestResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE file_processing_control
            SET loaded_rows = loaded_rows + $3, current_batch = $2,
                modified_date = now(), modified_by = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(id)
        .bind(batch_number as i32)
        .bind(rows_written as i64)
        .bind(SYSTEM_USER)
        .bind(FileStatus::InProgress.as_str())
        .execute(&mut **tx)
        .await?;

        if done.rows_affected() != 1 {
            return Err(IngestError::Orchestration(format!(
                "control record {} lost IN_PROGRESS status mid-run",
                id
            )));
        }

        Ok(())
    }

    /// Finalize a successful run (IN_PROGRESS -> COMPLETED)
    ///
    /// Sets the archive destination and clears any stale error message.
    pub async fn complete(&self, id: i64, archive_location: &str) -> IngestResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE file_processing_control
            SET status = $2, archive_location = $3, error_message = NULL,
                modified_date = now(), modified_by = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(id)
        .bind(FileStatus::Completed.as_str())
        .bind(archive_location)
        .bind(SYSTEM_USER)
        .bind(FileStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() != 1 {
            return Err(IngestError::Orchestration(format!(
                "control record {} is not IN_PROGRESS and cannot be completed",
                id
            )));
        }

        Ok(())
    }

    /// Finalize a failed run (IN_PROGRESS -> FAILED)
    ///
    /// Counters are preserved for diagnosis and resume.
    pub async fn fail(&self, id: i64, error_message: &str) -> IngestResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE file_processing_control
            SET status = $2, error_message = $3,
                modified_date = now(), modified_by = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(id)
        .bind(FileStatus::Failed.as_str())
        .bind(error_message)
        .bind(SYSTEM_USER)
        .bind(FileStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() != 1 {
            return Err(IngestError::Orchestration(format!(
                "control record {} is not IN_PROGRESS and cannot be failed",
                id
            )));
        }

        Ok(())
    }

    /// Record that the archival move completed
    pub async fn mark_archived(&self, id: i64) -> IngestResult<()> {
        sqlx::query(
            r#"
            UPDATE file_processing_control
            SET file_location = archive_location, error_message = NULL,
                modified_date = now(), modified_by = $2
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(SYSTEM_USER)
        .bind(FileStatus::Completed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Note an archival failure on a COMPLETED record
    ///
    /// The data is durable, so the status stays COMPLETED; the message
    /// flags the stranded file for manual follow-up.
    pub async fn note_archive_failure(&self, id: i64, message: &str) -> IngestResult<()> {
        sqlx::query(
            r#"
            UPDATE file_processing_control
            SET error_message = $2, modified_date = now(), modified_by = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .bind(SYSTEM_USER)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch one control record by id
    pub async fn fetch(&self, id: i64) -> IngestResult<FileProcessingControl> {
        let sql = format!(
            "SELECT {} FROM file_processing_control WHERE id = $1",
            CONTROL_COLUMNS
        );
        let control = sqlx::query_as::<_, FileProcessingControl>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(control)
    }

    /// All FAILED records, oldest first (retry candidates)
    pub async fn find_failed(&self) -> IngestResult<Vec<FileProcessingControl>> {
        let sql = format!(
            "SELECT {} FROM file_processing_control WHERE status = $1 ORDER BY id",
            CONTROL_COLUMNS
        );
        let controls = sqlx::query_as::<_, FileProcessingControl>(&sql)
            .bind(FileStatus::Failed.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(controls)
    }

    /// COMPLETED records whose file never reached the archive
    pub async fn find_archival_pending(&self) -> IngestResult<Vec<FileProcessingControl>> {
        let sql = format!(
            "SELECT {} FROM file_processing_control \
             WHERE status = $1 \
               AND archive_location IS NOT NULL \
               AND file_location IS DISTINCT FROM archive_location \
             ORDER BY id",
            CONTROL_COLUMNS
        );
        let controls = sqlx::query_as::<_, FileProcessingControl>(&sql)
            .bind(FileStatus::Completed.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(controls)
    }
}

/// Postgres unique-violation check (SQLSTATE 23505)
fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
