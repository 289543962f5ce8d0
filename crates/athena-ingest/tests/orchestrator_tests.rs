//! End-to-end orchestrator tests
//!
//! These exercise the full claim -> batch -> finalize -> archive path
//! against a live Postgres and a temp directory pair.
//! Run with: `cargo test --test orchestrator_tests -- --ignored`

mod helpers;

use athena_ingest::config::FilePattern;
use athena_ingest::control::{FileStatus, ProgressTracker};
use athena_ingest::decode::RecordDecoder;
use athena_ingest::record::FileKind;
use athena_ingest::source::LocalFileStore;
use athena_ingest::{
    FileOrchestrator, IngestError, LoadMonitor, ReadOptions, StagingWriter,
};
use helpers::{bad_consignee_line, consignee_line, test_config, write_flat_file, TestDb};
use std::path::Path;
use std::sync::Arc;

fn orchestrator(
    db: &TestDb,
    input: &Path,
    archive: &Path,
    batch_size: usize,
) -> FileOrchestrator {
    FileOrchestrator::new(
        test_config(input, archive, batch_size),
        db.pool(),
        Arc::new(LocalFileStore::new()),
    )
}

async fn staged_count(db: &TestDb, process_id: &str) -> i64 {
    LoadMonitor::new(db.pool())
        .staged_row_count(FileKind::Consignee, process_id)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires database
async fn test_process_completes_loads_and_archives() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let lines: Vec<String> = (0..5).map(|i| consignee_line(&format!("BOL{}", i))).collect();
    let file = write_flat_file(input.path(), "consignee_daily.csv", &lines);

    let orchestrator = orchestrator(&db, input.path(), archive.path(), 2);
    let control = orchestrator
        .process(&file, FileKind::Consignee, ReadOptions::default())
        .await
        .unwrap();

    assert_eq!(control.status, FileStatus::Completed);
    assert_eq!(control.total_rows, Some(5));
    assert_eq!(control.loaded_rows, 5);
    assert_eq!(control.current_batch, 3);
    assert!(control.error_message.is_none());

    // Exactly the file's rows were staged under this run's lineage
    assert_eq!(staged_count(&db, &control.process_id).await, 5);

    // Source file moved to the dated archive location
    assert!(!Path::new(&file).exists());
    let archive_location = control.archive_location.clone().unwrap();
    assert!(Path::new(&archive_location).exists());
    assert!(archive_location.contains("consignee_daily.csv"));
    assert_eq!(control.file_location, control.archive_location);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_decode_skips_below_threshold_still_complete() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let lines = vec![
        consignee_line("BOL1"),
        bad_consignee_line("BOL2"),
        consignee_line("BOL3"),
    ];
    let file = write_flat_file(input.path(), "consignee_mixed.csv", &lines);

    let orchestrator = orchestrator(&db, input.path(), archive.path(), 100);
    let control = orchestrator
        .process(&file, FileKind::Consignee, ReadOptions::default())
        .await
        .unwrap();

    assert_eq!(control.status, FileStatus::Completed);
    assert_eq!(control.total_rows, Some(3));
    assert_eq!(control.loaded_rows, 2);
    assert_eq!(staged_count(&db, &control.process_id).await, 2);
    assert!(!Path::new(&file).exists());
}

#[tokio::test]
#[ignore] // Requires database
async fn test_threshold_exceeded_fails_and_leaves_file() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let lines = vec![
        consignee_line("BOL1"),
        bad_consignee_line("BOL2"),
        bad_consignee_line("BOL3"),
    ];
    let file = write_flat_file(input.path(), "consignee_bad.csv", &lines);

    let mut config = test_config(input.path(), archive.path(), 100);
    config.max_decode_errors = 1;
    let orchestrator =
        FileOrchestrator::new(config, db.pool(), Arc::new(LocalFileStore::new()));

    let control = orchestrator
        .process(&file, FileKind::Consignee, ReadOptions::default())
        .await
        .unwrap();

    assert_eq!(control.status, FileStatus::Failed);
    let message = control.error_message.unwrap();
    assert!(message.contains("fail-fast threshold"));
    assert!(control.archive_location.is_none());

    // Failed files stay where they were for inspection and retry
    assert!(Path::new(&file).exists());
}

#[tokio::test]
#[ignore] // Requires database
async fn test_resume_never_duplicates_committed_batches() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let lines: Vec<String> = (0..4).map(|i| consignee_line(&format!("BOL{}", i))).collect();
    let file = write_flat_file(input.path(), "consignee_resume.csv", &lines);

    // Simulate a crashed run: batch 1 committed, then the run failed.
    let tracker = ProgressTracker::new(db.pool());
    let claimed = tracker
        .claim("consignee_resume.csv", &file, FileKind::Consignee, None)
        .await
        .unwrap();
    tracker.set_total_rows(claimed.id, 4).await.unwrap();

    let decoder = RecordDecoder::new(FileKind::Consignee);
    let rows: Vec<_> = lines[..2]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let record = csv::StringRecord::from(line.split(',').collect::<Vec<_>>());
            decoder.decode(i as u64 + 1, &record).unwrap()
        })
        .collect();

    let writer = StagingWriter::new();
    let mut tx = db.pool().begin().await.unwrap();
    let written = writer
        .write_batch(&mut tx, FileKind::Consignee, &claimed.process_id, &rows)
        .await
        .unwrap();
    tracker
        .record_batch(&mut tx, claimed.id, 1, written)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    tracker.fail(claimed.id, "simulated crash").await.unwrap();

    // Resume finishes the remaining batch without re-inserting batch 1.
    let orchestrator = orchestrator(&db, input.path(), archive.path(), 2);
    let control = orchestrator.resume(claimed.id).await.unwrap();

    assert_eq!(control.status, FileStatus::Completed);
    assert_eq!(control.loaded_rows, 4);
    assert_eq!(control.current_batch, 2);
    assert_eq!(control.process_id, claimed.process_id);
    assert_eq!(staged_count(&db, &control.process_id).await, 4);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_process_aborts_on_existing_claim() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let file = write_flat_file(
        input.path(),
        "consignee_claimed.csv",
        &[consignee_line("BOL1")],
    );

    let tracker = ProgressTracker::new(db.pool());
    tracker
        .claim("consignee_claimed.csv", &file, FileKind::Consignee, None)
        .await
        .unwrap();

    let orchestrator = orchestrator(&db, input.path(), archive.path(), 10);
    let err = orchestrator
        .process(&file, FileKind::Consignee, ReadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::ClaimConflict { .. }));

    // The loser made no writes and the file was not touched
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM file_processing_control WHERE file_path = $1",
    )
    .bind(&file)
    .fetch_one(&db.pool())
    .await
    .unwrap();
    assert_eq!(count, 1);
    assert!(Path::new(&file).exists());
}

#[tokio::test]
#[ignore] // Requires database
async fn test_archival_only_retry_moves_without_reloading() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    let file = write_flat_file(
        input.path(),
        "consignee_stranded.csv",
        &[consignee_line("BOL1")],
    );

    // Simulate a crash after the COMPLETED commit but before the move.
    let tracker = ProgressTracker::new(db.pool());
    let claimed = tracker
        .claim("consignee_stranded.csv", &file, FileKind::Consignee, None)
        .await
        .unwrap();
    tracker.set_total_rows(claimed.id, 1).await.unwrap();

    let destination = archive
        .path()
        .join("20260807_consignee_stranded.csv")
        .to_string_lossy()
        .to_string();
    tracker.complete(claimed.id, &destination).await.unwrap();
    assert!(Path::new(&file).exists());

    let orchestrator = orchestrator(&db, input.path(), archive.path(), 10);
    let finished = orchestrator.finish_archival().await.unwrap();

    assert_eq!(finished.len(), 1);
    assert!(!Path::new(&file).exists());
    assert!(Path::new(&destination).exists());
    assert_eq!(finished[0].file_location.as_deref(), Some(destination.as_str()));

    // No data was re-loaded by the archival retry
    assert_eq!(staged_count(&db, &claimed.process_id).await, 0);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_run_sweeps_patterns_and_drains_input() {
    let db = TestDb::new().await;
    let input = tempfile::tempdir().unwrap();
    let archive = tempfile::tempdir().unwrap();

    write_flat_file(
        input.path(),
        "consignee_20260801.csv",
        &[consignee_line("BOL1")],
    );
    write_flat_file(
        input.path(),
        "consignee_20260802.csv",
        &[consignee_line("BOL2")],
    );
    write_flat_file(input.path(), "unrelated.txt", &["ignore me".to_string()]);

    let mut config = test_config(input.path(), archive.path(), 10);
    config.patterns = vec![FilePattern {
        pattern: r"^consignee_\d+\.csv$".to_string(),
        kind: FileKind::Consignee,
        delimiter: ',',
        has_header: false,
    }];

    let orchestrator =
        FileOrchestrator::new(config, db.pool(), Arc::new(LocalFileStore::new()));

    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);

    let monitor = LoadMonitor::new(db.pool());
    let counts = monitor.control_summary().await.unwrap();
    assert_eq!(counts.completed, 2);

    // Completed files left the input folder, so a second sweep is a no-op
    let summary = orchestrator.run().await.unwrap();
    assert_eq!(summary.total(), 0);
}
