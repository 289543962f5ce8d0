//! Athena Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging bootstrap for the Athena workspace.
//!
//! # Overview
//!
//! This crate provides the pieces every Athena component needs:
//!
//! - **Error Handling**: the [`AthenaError`] type and [`Result`] alias
//! - **Logging**: tracing-based logging with configurable level, format,
//!   and output targets (console, daily-rotated file, or both)
//!
//! # Example
//!
//! ```no_run
//! use athena_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!
//!     info!("starting up");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{AthenaError, Result};
