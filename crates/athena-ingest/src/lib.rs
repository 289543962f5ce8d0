//! Athena Ingest Library
//!
//! Batched, resumable loading of AMS manifest flat files into Postgres
//! staging tables.
//!
//! # Architecture
//!
//! - **decode**: per-kind record decoders (flat file -> typed staging row)
//! - **batch**: fixed-size, restartable-by-index batching
//! - **staging**: transactional multi-row inserts into `ams_*_load` tables
//! - **control**: the `file_processing_control` state machine
//! - **orchestrator**: claim -> batch loop -> finalize -> archive
//! - **source**: local filesystem and S3 file stores
//! - **monitor**: read-only operational queries
//!
//! # Example
//!
//! ```no_run
//! use athena_ingest::{FileKind, FileOrchestrator, IngestConfig, ReadOptions};
//! use athena_ingest::source::LocalFileStore;
//! use std::sync::Arc;
//!
//! async fn load(db: sqlx::PgPool) -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let orchestrator = FileOrchestrator::new(config, db, Arc::new(LocalFileStore::new()));
//!
//!     let control = orchestrator
//!         .process("/data/input/consignee_20260807.csv", FileKind::Consignee, ReadOptions::default())
//!         .await?;
//!     println!("{}: {} rows", control.status, control.loaded_rows);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod control;
pub mod decode;
pub mod error;
pub mod monitor;
pub mod orchestrator;
pub mod record;
pub mod source;
pub mod staging;

pub use config::IngestConfig;
pub use control::{FileProcessingControl, FileStatus, ProgressTracker};
pub use error::{IngestError, IngestResult};
pub use monitor::LoadMonitor;
pub use orchestrator::{FileOrchestrator, ReadOptions, RunSummary};
pub use record::{FileKind, StagingRow};
pub use staging::StagingWriter;
