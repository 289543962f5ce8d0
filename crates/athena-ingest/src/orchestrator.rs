//! File ingestion orchestrator
//!
//! Drives one file end-to-end: claim, batch loop, finalize, archive.
//! Batches run strictly in order and each batch's staging writes share a
//! transaction with its progress update, so a crash between batches
//! leaves the control record exactly describing what is durable. Errors
//! are captured into the control record and returned as data; the claim
//! conflict is the only error that escapes, because the losing worker has
//! no record of its own to return.

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use sqlx::PgPool;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::batch::Batcher;
use crate::config::{FilePattern, IngestConfig};
use crate::control::{FileProcessingControl, ProgressTracker};
use crate::decode::{read_raw_records, RecordDecoder};
use crate::error::{IngestError, IngestResult};
use crate::record::FileKind;
use crate::source::{file_name, FileStore};
use crate::staging::StagingWriter;

/// Per-file read options, resolved from the matching file pattern
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub has_header: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: false,
        }
    }
}

impl From<&FilePattern> for ReadOptions {
    fn from(pattern: &FilePattern) -> Self {
        Self {
            delimiter: pattern.delimiter_byte(),
            has_header: pattern.has_header,
        }
    }
}

/// Outcome of one `run` sweep over the input folder
#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    /// Files skipped because another worker already held the claim
    pub skipped: usize,
    pub results: Vec<FileProcessingControl>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }

    /// Human-readable sweep summary
    pub fn summary(&self) -> String {
        format!(
            "Ingestion run summary:\n\
             - Files processed: {}\n\
             - Completed: {}\n\
             - Failed: {}\n\
             - Skipped (claimed elsewhere): {}",
            self.total(),
            self.completed,
            self.failed,
            self.skipped
        )
    }
}

/// Top-level driver for file ingestion
pub struct FileOrchestrator {
    config: IngestConfig,
    db: PgPool,
    store: Arc<dyn FileStore>,
    tracker: ProgressTracker,
    writer: StagingWriter,
}

impl FileOrchestrator {
    pub fn new(config: IngestConfig, db: PgPool, store: Arc<dyn FileStore>) -> Self {
        let tracker = ProgressTracker::new(db.clone());
        Self {
            config,
            db,
            store,
            tracker,
            writer: StagingWriter::new(),
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Process one file through claim -> batches -> finalize
    ///
    /// Returns the control record in its terminal state. Failures are
    /// recorded on the control record, not raised, except for
    /// [`IngestError::ClaimConflict`] which aborts before any control
    /// mutation.
    pub async fn process(
        &self,
        file_path: &str,
        kind: FileKind,
        options: ReadOptions,
    ) -> IngestResult<FileProcessingControl> {
        self.process_with_file_id(file_path, kind, options, None).await
    }

    /// [`FileOrchestrator::process`] with an external file identifier
    /// recorded on the control record
    pub async fn process_with_file_id(
        &self,
        file_path: &str,
        kind: FileKind,
        options: ReadOptions,
        file_id: Option<&str>,
    ) -> IngestResult<FileProcessingControl> {
        let name = file_name(file_path).to_string();
        info!(file = %name, table = kind.table(), "Claiming file");

        let control = self.tracker.claim(&name, file_path, kind, file_id).await?;
        self.drive_to_terminal(control, options).await
    }

    /// Resume a FAILED control record from its last committed batch
    pub async fn resume(&self, control_id: i64) -> IngestResult<FileProcessingControl> {
        let control = self.tracker.reclaim(control_id).await?;
        info!(
            file = %control.file_name,
            from_batch = control.current_batch + 1,
            "Resuming file"
        );

        let options = self.options_for(&control.file_name);
        self.drive_to_terminal(control, options).await
    }

    /// Retry every FAILED record
    ///
    /// By default resumes each from `current_batch + 1`; with
    /// `from_start` the counters are reset and the whole file reloads
    /// under a fresh process_id.
    pub async fn retry_failed(
        &self,
        from_start: bool,
    ) -> IngestResult<Vec<FileProcessingControl>> {
        let failed = self.tracker.find_failed().await?;
        if failed.is_empty() {
            info!("No failed files to retry");
            return Ok(vec![]);
        }

        info!("Retrying {} failed file(s)", failed.len());

        let mut results = Vec::new();
        for record in failed {
            let id = record.id;
            if from_start {
                if let Err(e) = self.tracker.reset_for_reload(id).await {
                    warn!(control_id = id, error = %e, "Skipping reset of control record");
                    continue;
                }
            }

            match self.resume(id).await {
                Ok(control) => results.push(control),
                Err(e) => {
                    // One stuck file must not block the rest of the queue
                    warn!(control_id = id, error = %e, "Retry failed");
                },
            }
        }

        Ok(results)
    }

    /// Complete stranded archival moves for COMPLETED records
    ///
    /// Data for these records is already durable; only the file move is
    /// re-attempted, never the load.
    pub async fn finish_archival(&self) -> IngestResult<Vec<FileProcessingControl>> {
        let pending = self.tracker.find_archival_pending().await?;

        let mut finished = Vec::new();
        for record in pending {
            let Some(destination) = record.archive_location.clone() else {
                continue;
            };
            let Some(source) = record.file_location.clone() else {
                continue;
            };

            match self.store.move_file(&source, &destination).await {
                Ok(()) => {
                    self.tracker.mark_archived(record.id).await?;
                    info!(file = %record.file_name, archive = %destination, "Archival completed");
                    finished.push(self.tracker.fetch(record.id).await?);
                },
                Err(e) => {
                    warn!(file = %record.file_name, error = %e, "Archival retry failed");
                },
            }
        }

        Ok(finished)
    }

    /// Scan the input folder for files matching the configured patterns
    /// and process each match
    ///
    /// Files run concurrently up to the configured limit; the exclusive
    /// claim keeps two workers off the same file, here and across
    /// processes.
    pub async fn run(&self) -> IngestResult<RunSummary> {
        let mut jobs: Vec<(String, FileKind, ReadOptions)> = Vec::new();

        for pattern in &self.config.patterns {
            let regex = Regex::new(&pattern.pattern).map_err(|e| {
                IngestError::Orchestration(format!(
                    "invalid file pattern {:?}: {}",
                    pattern.pattern, e
                ))
            })?;

            let files = self
                .store
                .list_files(&self.config.storage.input_dir, &regex)
                .await?;

            info!(
                pattern = %pattern.pattern,
                kind = %pattern.kind,
                matches = files.len(),
                "Scanned input folder"
            );

            for file in files {
                jobs.push((file, pattern.kind, ReadOptions::from(pattern)));
            }
        }

        if jobs.is_empty() {
            info!("No matching files found");
            return Ok(RunSummary::default());
        }

        info!(
            "Processing {} file(s) with concurrency {}",
            jobs.len(),
            self.config.concurrency
        );

        let outcomes: Vec<_> = stream::iter(jobs)
            .map(|(path, kind, options)| async move {
                (path.clone(), self.process(&path, kind, options).await)
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut summary = RunSummary::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(control) => {
                    if control.is_completed() {
                        summary.completed += 1;
                    } else {
                        summary.failed += 1;
                    }
                    summary.results.push(control);
                },
                Err(IngestError::ClaimConflict { .. }) => {
                    info!(file = %path, "Skipped: claimed by another worker");
                    summary.skipped += 1;
                },
                Err(e) => {
                    error!(file = %path, error = %e, "Processing aborted");
                    summary.failed += 1;
                },
            }
        }

        info!("{}", summary.summary());
        Ok(summary)
    }

    /// Drive a claimed record to a terminal state, capturing failures
    /// into the control record
    async fn drive_to_terminal(
        &self,
        control: FileProcessingControl,
        options: ReadOptions,
    ) -> IngestResult<FileProcessingControl> {
        let id = control.id;
        match self.drive(&control, options).await {
            Ok(()) => self.tracker.fetch(id).await,
            Err(e) => {
                error!(file = %control.file_name, error = %e, "File processing failed");
                self.tracker.fail(id, &e.to_string()).await?;
                self.tracker.fetch(id).await
            },
        }
    }

    /// The batch loop for one claimed file
    async fn drive(
        &self,
        control: &FileProcessingControl,
        options: ReadOptions,
    ) -> IngestResult<()> {
        let kind = control
            .kind()
            .map_err(|e| IngestError::Orchestration(e.to_string()))?;

        let content = self.store.read_to_string(&control.file_path).await?;
        let records = read_raw_records(&content, options.delimiter, options.has_header)?;

        let total = records.len();
        self.tracker.set_total_rows(control.id, total as i64).await?;

        let decoder = RecordDecoder::new(kind);
        let mut batcher = Batcher::new(decoder, records, self.config.batch_size, options.has_header);

        // On resume, records already consumed by committed batches minus
        // rows actually loaded gives the skips already spent.
        let consumed = (control.current_batch as usize * self.config.batch_size).min(total);
        let mut skipped = consumed.saturating_sub(control.loaded_rows as usize);

        if control.current_batch > 0 {
            batcher.resume_from(control.current_batch as u32);
            info!(
                file = %control.file_name,
                committed_batches = control.current_batch,
                "Seeking past committed batches"
            );
        }

        while let Some(batch) = batcher.next_batch() {
            for skip in &batch.skips {
                warn!(
                    file = %control.file_name,
                    line = skip.line,
                    reason = %skip.reason,
                    "Record skipped"
                );
            }

            skipped += batch.skips.len();
            if skipped > self.config.max_decode_errors {
                return Err(IngestError::Orchestration(format!(
                    "malformed records exceed fail-fast threshold ({} > {})",
                    skipped, self.config.max_decode_errors
                )));
            }

            let mut tx = self.db.begin().await?;
            let written = self
                .writer
                .write_batch(&mut tx, kind, &control.process_id, &batch.rows)
                .await?;
            self.tracker
                .record_batch(&mut tx, control.id, batch.number, written)
                .await?;
            tx.commit().await?;

            info!(
                file = %control.file_name,
                batch = batch.number,
                rows = written,
                skipped = batch.skips.len(),
                "Batch committed"
            );
        }

        let destination = archive_destination(
            &self.config.storage.archive_dir,
            &control.file_name,
            Utc::now().date_naive(),
        );
        self.tracker.complete(control.id, &destination).await?;

        info!(
            file = %control.file_name,
            total_rows = total,
            skipped = skipped,
            "File completed, archiving"
        );

        // Archival strictly follows the COMPLETED commit. A failed move
        // leaves the data durable and the file flagged for follow-up.
        match self.store.move_file(&control.file_path, &destination).await {
            Ok(()) => {
                self.tracker.mark_archived(control.id).await?;
                info!(file = %control.file_name, archive = %destination, "File archived");
            },
            Err(e) => {
                error!(
                    file = %control.file_name,
                    error = %e,
                    "Archival failed after commit; file left in place"
                );
                self.tracker
                    .note_archive_failure(
                        control.id,
                        &format!("archival failed after load: {}", e),
                    )
                    .await?;
            },
        }

        Ok(())
    }

    /// Read options for a file name, resolved from the configured patterns
    fn options_for(&self, file_name: &str) -> ReadOptions {
        for pattern in &self.config.patterns {
            if let Ok(regex) = Regex::new(&pattern.pattern) {
                if regex.is_match(file_name) {
                    return ReadOptions::from(pattern);
                }
            }
        }
        ReadOptions::default()
    }
}

/// Archive destination: `<archive_dir>/<YYYYMMDD>_<file_name>`
fn archive_destination(archive_dir: &Path, file_name: &str, date: NaiveDate) -> String {
    archive_dir
        .join(format!("{}_{}", date.format("%Y%m%d"), file_name))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_destination_naming() {
        let destination = archive_destination(
            Path::new("/data/archive"),
            "consignee_daily.csv",
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
        );
        assert_eq!(destination, "/data/archive/20260807_consignee_daily.csv");
    }

    #[test]
    fn test_read_options_from_pattern() {
        let pattern = FilePattern {
            pattern: "^cont_.*$".to_string(),
            kind: FileKind::Container,
            delimiter: '|',
            has_header: true,
        };
        let options = ReadOptions::from(&pattern);
        assert_eq!(options.delimiter, b'|');
        assert!(options.has_header);
    }

    #[test]
    fn test_run_summary_text() {
        let summary = RunSummary {
            completed: 3,
            failed: 1,
            skipped: 2,
            results: vec![],
        };
        let text = summary.summary();
        assert!(text.contains("Files processed: 6"));
        assert!(text.contains("Completed: 3"));
        assert!(text.contains("Failed: 1"));
        assert!(text.contains("Skipped (claimed elsewhere): 2"));
    }
}
