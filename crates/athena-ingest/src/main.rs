//! Athena Ingest - flat-file ingestion tool

use anyhow::Result;
use athena_common::logging::{init_logging, LogConfig, LogLevel};
use athena_ingest::source::{build_store, FileStore};
use athena_ingest::{FileKind, FileOrchestrator, IngestConfig, LoadMonitor, ReadOptions};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "athena-ingest")]
#[command(author, version, about = "Athena flat-file ingestion engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Scan the input folder and process every file matching a pattern
    Run,

    /// Process a single file into one staging table
    Process {
        /// Path (or object key) of the flat file
        #[arg(short, long)]
        file: String,

        /// Target staging table or record kind (e.g. "ams_header_load" or "header")
        #[arg(short, long)]
        table: String,

        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Skip a header row
        #[arg(long)]
        has_header: bool,

        /// External file identifier to record on the control record
        #[arg(long)]
        file_id: Option<String>,
    },

    /// Retry failed files, resuming from the last committed batch
    Retry {
        /// Reload from the beginning instead of resuming
        #[arg(long)]
        from_start: bool,
    },

    /// Complete archival moves stranded by an earlier crash
    Archive,

    /// Show control-table status
    Status {
        /// Show one run's progress by process id
        #[arg(long)]
        process_id: Option<String>,

        /// How many recent control records to list
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("athena-ingest".to_string())
        .build();

    // Environment variables take precedence over the defaults above
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let config = IngestConfig::load()?;
    info!("Configuration loaded");

    let db = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    let store: Arc<dyn FileStore> = Arc::from(build_store(&config.storage)?);

    match cli.command {
        Command::Run => {
            let orchestrator = FileOrchestrator::new(config, db, store);
            let summary = orchestrator.run().await?;
            println!("{}", summary.summary());
        },
        Command::Process {
            file,
            table,
            delimiter,
            has_header,
            file_id,
        } => {
            let kind: FileKind = table.parse()?;
            let options = ReadOptions {
                delimiter: delimiter as u8,
                has_header,
            };

            let orchestrator = FileOrchestrator::new(config, db, store);
            let control = orchestrator
                .process_with_file_id(&file, kind, options, file_id.as_deref())
                .await?;

            println!(
                "{}: {} ({} of {} rows loaded, batch {})",
                control.file_name,
                control.status,
                control.loaded_rows,
                control
                    .total_rows
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                control.current_batch
            );
            if let Some(error) = &control.error_message {
                println!("  error: {}", error);
            }
        },
        Command::Retry { from_start } => {
            let orchestrator = FileOrchestrator::new(config, db, store);
            let results = orchestrator.retry_failed(from_start).await?;

            println!("Retried {} file(s)", results.len());
            for control in results {
                println!(
                    "  {} -> {} ({} rows)",
                    control.file_name, control.status, control.loaded_rows
                );
            }
        },
        Command::Archive => {
            let orchestrator = FileOrchestrator::new(config, db, store);
            let finished = orchestrator.finish_archival().await?;

            println!("Completed {} archival move(s)", finished.len());
            for control in finished {
                if let Some(archive) = &control.archive_location {
                    println!("  {} -> {}", control.file_name, archive);
                }
            }
        },
        Command::Status { process_id, limit } => {
            let monitor = LoadMonitor::new(db);

            match process_id {
                Some(process_id) => match monitor.process_progress(&process_id).await? {
                    Some(progress) => {
                        let control = &progress.control;
                        println!("Process {}", control.process_id);
                        println!("  File:    {}", control.file_name);
                        println!("  Table:   {}", control.target_table);
                        println!("  Status:  {}", control.status);
                        println!(
                            "  Rows:    {} / {} ({:.1}%)",
                            control.loaded_rows,
                            control
                                .total_rows
                                .map(|t| t.to_string())
                                .unwrap_or_else(|| "?".to_string()),
                            progress.completion_percentage()
                        );
                        println!("  Batch:   {}", control.current_batch);
                        println!("  Staged:  {} rows", progress.staged_rows);
                        if let Some(error) = &control.error_message {
                            println!("  Error:   {}", error);
                        }
                    },
                    None => println!("No control record for process {}", process_id),
                },
                None => {
                    let summary = monitor.control_summary().await?;
                    println!("Control records ({} total):", summary.total());
                    println!("  Pending:     {}", summary.pending);
                    println!("  In progress: {}", summary.in_progress);
                    println!("  Completed:   {}", summary.completed);
                    println!("  Failed:      {}", summary.failed);
                    println!();

                    let recent = monitor.recent_controls(limit).await?;
                    if !recent.is_empty() {
                        println!("Recent files:");
                        for control in recent {
                            println!(
                                "  [{}] {} {} ({} rows)",
                                control.id, control.status, control.file_name, control.loaded_rows
                            );
                        }
                    }
                },
            }
        },
    }

    Ok(())
}
