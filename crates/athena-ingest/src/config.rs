//! Configuration management
//!
//! All settings are environment-driven with sensible defaults; the file
//! pattern list lives in a JSON file referenced by `ATHENA_PATTERNS_PATH`.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::record::FileKind;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default number of tolerated malformed records before the whole file fails.
pub const DEFAULT_MAX_DECODE_ERRORS: usize = 50;

/// Default number of files processed concurrently by `run`.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/athena";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per batch (one transaction per batch)
    pub batch_size: usize,
    /// Malformed-record tolerance before the file fails outright
    pub max_decode_errors: usize,
    /// How many files `run` processes concurrently
    pub concurrency: usize,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    /// File name patterns mapped to record kinds
    pub patterns: Vec<FilePattern>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Which file store backs the input/archive folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "fs" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

/// File storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Folder (or key prefix) scanned for incoming files
    pub input_dir: PathBuf,
    /// Folder (or key prefix) successful files are moved into
    pub archive_dir: PathBuf,
    /// S3 settings, used when backend is S3
    pub s3: S3Config,
}

/// S3-compatible object store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl S3Config {
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "athena-data".to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_default(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

/// Maps a file name pattern to the record kind it contains
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePattern {
    /// Regex matched against the file name (not the full path)
    pub pattern: String,
    /// Record kind / staging target for matching files
    pub kind: FileKind,
    /// Field delimiter (default: comma)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Whether the first record is a header row to skip
    #[serde(default)]
    pub has_header: bool,
}

fn default_delimiter() -> char {
    ','
}

impl FilePattern {
    /// Delimiter as the single byte the csv reader expects
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }
}

impl IngestConfig {
    /// Load configuration from environment and defaults
    ///
    /// Environment variables:
    /// - `ATHENA_BATCH_SIZE`, `ATHENA_MAX_DECODE_ERRORS`, `ATHENA_CONCURRENCY`
    /// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `DATABASE_MIN_CONNECTIONS`,
    ///   `DATABASE_CONNECT_TIMEOUT`, `DATABASE_IDLE_TIMEOUT`
    /// - `FILE_STORAGE_TYPE` (local/s3), `INPUT_FOLDER`, `ARCHIVE_FOLDER`
    /// - `S3_ENDPOINT`, `S3_REGION`, `S3_BUCKET`, `S3_ACCESS_KEY`,
    ///   `S3_SECRET_KEY`, `S3_PATH_STYLE`
    /// - `ATHENA_PATTERNS_PATH` (JSON file with the pattern list)
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let patterns = match env::var("ATHENA_PATTERNS_PATH") {
            Ok(path) => Self::load_patterns(Path::new(&path))?,
            Err(_) => Vec::new(),
        };

        let config = IngestConfig {
            batch_size: env::var("ATHENA_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
            max_decode_errors: env::var("ATHENA_MAX_DECODE_ERRORS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_DECODE_ERRORS),
            concurrency: env::var("ATHENA_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CONCURRENCY),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: env::var("DATABASE_IDLE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            storage: StorageConfig {
                backend: env::var("FILE_STORAGE_TYPE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_default(),
                input_dir: PathBuf::from(
                    env::var("INPUT_FOLDER").unwrap_or_else(|_| "./data/input".to_string()),
                ),
                archive_dir: PathBuf::from(
                    env::var("ARCHIVE_FOLDER").unwrap_or_else(|_| "./data/archive".to_string()),
                ),
                s3: S3Config::from_env(),
            },
            patterns,
        };

        config.validate()?;

        Ok(config)
    }

    /// Read the pattern list from a JSON file
    pub fn load_patterns(path: &Path) -> anyhow::Result<Vec<FilePattern>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Cannot read patterns file {}: {}", path.display(), e)
        })?;
        let patterns: Vec<FilePattern> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid patterns file {}: {}", path.display(), e))?;
        Ok(patterns)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if self.concurrency == 0 {
            anyhow::bail!("Concurrency must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        for p in &self.patterns {
            regex::Regex::new(&p.pattern)
                .map_err(|e| anyhow::anyhow!("Invalid file pattern {:?}: {}", p.pattern, e))?;
        }

        if self.storage.backend == StorageBackend::S3 && self.storage.s3.bucket.is_empty() {
            anyhow::bail!("S3 storage requires a bucket name");
        }

        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_decode_errors: DEFAULT_MAX_DECODE_ERRORS,
            concurrency: DEFAULT_CONCURRENCY,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                input_dir: PathBuf::from("./data/input"),
                archive_dir: PathBuf::from("./data/archive"),
                s3: S3Config {
                    endpoint: None,
                    region: "us-east-1".to_string(),
                    bucket: "athena-data".to_string(),
                    access_key: String::new(),
                    secret_key: String::new(),
                    path_style: false,
                },
            },
            patterns: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validates() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_decode_errors, DEFAULT_MAX_DECODE_ERRORS);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = IngestConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_bounds_rejected() {
        let mut config = IngestConfig::default();
        config.database.min_connections = 20;
        config.database.max_connections = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut config = IngestConfig::default();
        config.patterns.push(FilePattern {
            pattern: "[unclosed".to_string(),
            kind: FileKind::Header,
            delimiter: ',',
            has_header: false,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert!("tape".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_load_patterns_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"pattern": "^header_.*\\.csv$", "kind": "header", "has_header": true}},
                {{"pattern": "^cont_.*\\.txt$", "kind": "container", "delimiter": "|"}}
            ]"#
        )
        .unwrap();

        let patterns = IngestConfig::load_patterns(file.path()).unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].kind, FileKind::Header);
        assert!(patterns[0].has_header);
        assert_eq!(patterns[0].delimiter, ',');
        assert_eq!(patterns[1].kind, FileKind::Container);
        assert_eq!(patterns[1].delimiter_byte(), b'|');
        assert!(!patterns[1].has_header);
    }
}
