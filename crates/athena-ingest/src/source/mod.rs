//! File store abstraction
//!
//! The engine consumes flat files from either the local filesystem or an
//! S3-compatible object store. Both are driven through the same trait:
//! list candidates by name pattern, read a file's content, and move a
//! file (archival). Paths are plain strings so local paths and object
//! keys share one interface.

pub mod s3;

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

use crate::error::{IngestError, IngestResult};

pub use s3::S3FileStore;

/// Storage backend for input and archive files
#[async_trait]
pub trait FileStore: Send + Sync {
    /// List files directly under `dir` whose file name matches `pattern`
    async fn list_files(&self, dir: &Path, pattern: &Regex) -> IngestResult<Vec<String>>;

    /// Read a file's entire content as UTF-8 text
    async fn read_to_string(&self, path: &str) -> IngestResult<String>;

    /// Move a file, creating the destination hierarchy as needed
    async fn move_file(&self, source: &str, destination: &str) -> IngestResult<()>;
}

/// File name portion of a path or object key
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Local filesystem store
#[derive(Debug, Clone, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn list_files(&self, dir: &Path, pattern: &Regex) -> IngestResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if pattern.is_match(&name) {
                files.push(entry.path().to_string_lossy().to_string());
            }
        }

        files.sort();
        Ok(files)
    }

    async fn read_to_string(&self, path: &str) -> IngestResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn move_file(&self, source: &str, destination: &str) -> IngestResult<()> {
        if let Some(parent) = Path::new(destination).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::rename(source, destination).await {
            Ok(()) => Ok(()),
            Err(_) => {
                // rename fails across filesystems; fall back to copy+remove
                tokio::fs::copy(source, destination).await?;
                tokio::fs::remove_file(source).await?;
                Ok(())
            },
        }
    }
}

/// Build the store configured for the environment
pub fn build_store(config: &crate::config::StorageConfig) -> IngestResult<Box<dyn FileStore>> {
    match config.backend {
        crate::config::StorageBackend::Local => Ok(Box::new(LocalFileStore::new())),
        crate::config::StorageBackend::S3 => {
            if config.s3.bucket.is_empty() {
                return Err(IngestError::Orchestration(
                    "S3 storage selected but no bucket configured".to_string(),
                ));
            }
            Ok(Box::new(S3FileStore::new(config.s3.clone())))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/data/input/consignee.csv"), "consignee.csv");
        assert_eq!(file_name("input/nested/key.txt"), "key.txt");
        assert_eq!(file_name("bare.csv"), "bare.csv");
    }

    #[tokio::test]
    async fn test_local_list_files_filters_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["header_20260801.csv", "header_20260802.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("header_subdir.csv")).unwrap();

        let store = LocalFileStore::new();
        let pattern = Regex::new(r"^header_\d+\.csv$").unwrap();
        let files = store.list_files(dir.path(), &pattern).await.unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("header_20260801.csv"));
        assert!(files[1].ends_with("header_20260802.csv"));
    }

    #[tokio::test]
    async fn test_local_move_creates_destination_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.csv");
        std::fs::write(&source, "BOL1,ACME").unwrap();

        let destination = dir.path().join("archive/2026/in.csv");
        let store = LocalFileStore::new();
        store
            .move_file(
                source.to_str().unwrap(),
                destination.to_str().unwrap(),
            )
            .await
            .unwrap();

        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "BOL1,ACME");
    }

    #[tokio::test]
    async fn test_local_read_missing_file_is_io_error() {
        let store = LocalFileStore::new();
        let err = store.read_to_string("/nonexistent/file.csv").await.unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
