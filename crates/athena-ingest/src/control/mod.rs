//! Control-table ownership
//!
//! `file_processing_control` is written exclusively through this module:
//! the model types in [`model`] and the [`tracker::ProgressTracker`] that
//! drives every status transition.

pub mod model;
pub mod tracker;

pub use model::{FileProcessingControl, FileStatus, SYSTEM_USER};
pub use tracker::ProgressTracker;
