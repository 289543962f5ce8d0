//! S3-backed file store
//!
//! Input and archive folders live under key prefixes in one bucket. A
//! "move" is copy-then-delete, matching object-store semantics.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

use super::{file_name, FileStore};
use crate::config::S3Config;
use crate::error::{IngestError, IngestResult};

/// Object-store file source/sink
#[derive(Clone)]
pub struct S3FileStore {
    config: S3Config,
    bucket: String,
}

impl S3FileStore {
    pub fn new(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        Self { config, bucket }
    }

    async fn client(&self) -> Client {
        let credentials = Credentials::new(
            &self.config.access_key,
            &self.config.secret_key,
            None,
            None,
            "athena-ingest",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(self.config.region.clone()))
            .force_path_style(self.config.path_style);

        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Client::from_conf(builder.build())
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn list_files(&self, dir: &Path, pattern: &Regex) -> IngestResult<Vec<String>> {
        let prefix = dir.to_string_lossy().trim_matches('/').to_string();
        let client = self.client().await;

        debug!(bucket = %self.bucket, prefix = %prefix, "listing objects");

        let mut files = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(format!("{}/", prefix));
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| {
                IngestError::Orchestration(format!(
                    "failed to list s3://{}/{}: {}",
                    self.bucket, prefix, e
                ))
            })?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    if pattern.is_match(file_name(key)) {
                        files.push(key.to_string());
                    }
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        files.sort();
        Ok(files)
    }

    async fn read_to_string(&self, path: &str) -> IngestResult<String> {
        let client = self.client().await;

        let response = client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                IngestError::Orchestration(format!(
                    "failed to read s3://{}/{}: {}",
                    self.bucket, path, e
                ))
            })?;

        let bytes = response.body.collect().await.map_err(|e| {
            IngestError::Orchestration(format!(
                "failed to stream s3://{}/{}: {}",
                self.bucket, path, e
            ))
        })?;

        String::from_utf8(bytes.into_bytes().to_vec()).map_err(|e| {
            IngestError::Orchestration(format!(
                "s3://{}/{} is not valid UTF-8: {}",
                self.bucket, path, e
            ))
        })
    }

    async fn move_file(&self, source: &str, destination: &str) -> IngestResult<()> {
        let client = self.client().await;

        client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(format!("{}/{}", self.bucket, source))
            .key(destination)
            .send()
            .await
            .map_err(|e| {
                IngestError::Orchestration(format!(
                    "failed to copy s3://{}/{} to {}: {}",
                    self.bucket, source, destination, e
                ))
            })?;

        client
            .delete_object()
            .bucket(&self.bucket)
            .key(source)
            .send()
            .await
            .map_err(|e| {
                IngestError::Orchestration(format!(
                    "failed to delete s3://{}/{} after copy: {}",
                    self.bucket, source, e
                ))
            })?;

        info!(
            "Moved s3://{}/{} to s3://{}/{}",
            self.bucket, source, self.bucket, destination
        );
        Ok(())
    }
}
