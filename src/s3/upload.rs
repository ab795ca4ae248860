use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tracing::{debug, info};

use super::checksum::digest_file;
use super::client::{PutObjectRequest, StorageClient};
use super::error::{Result, S3UploadError};
use super::helpers::detect_content_type;
use crate::config::UploadConfig;

/// One matched local path, queued for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    /// Position in the matcher's output
    pub index: usize,
    pub path: String,
}

impl UploadJob {
    pub fn new(index: usize, path: impl Into<String>) -> Self {
        Self {
            index,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded,
    /// Directory in the match list, nothing sent
    SkippedDirectory,
    /// Dry run, nothing sent
    DryRun,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::SkippedDirectory => "skipped_directory",
            Self::DryRun => "dry_run",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of a single job
#[derive(Debug)]
pub struct UploadResult {
    pub index: usize,
    pub path: String,
    /// Derived object key, absent for directories and stat failures
    pub key: Option<String>,
    pub status: UploadStatus,
    pub elapsed: Duration,
    pub error: Option<S3UploadError>,
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn failed(job: &UploadJob, key: Option<String>, error: S3UploadError) -> Self {
        Self {
            index: job.index,
            path: job.path.clone(),
            key,
            status: UploadStatus::Failed,
            elapsed: Duration::ZERO,
            error: Some(error),
        }
    }
}

/// Upload one matched path and time it
///
/// Never panics on I/O or storage failures; they are captured in the
/// returned result so sibling jobs keep running.
pub async fn upload_file(
    job: &UploadJob,
    config: &UploadConfig,
    client: &dyn StorageClient,
) -> UploadResult {
    let start = Instant::now();
    let mut key = None;
    let outcome = put_path(job, config, client, &mut key).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(status) => UploadResult {
            index: job.index,
            path: job.path.clone(),
            key,
            status,
            elapsed,
            error: None,
        },
        Err(e) => UploadResult {
            elapsed,
            ..UploadResult::failed(job, key, e)
        },
    }
}

async fn put_path(
    job: &UploadJob,
    config: &UploadConfig,
    client: &dyn StorageClient,
    key_out: &mut Option<String>,
) -> Result<UploadStatus> {
    let path = Path::new(&job.path);

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| S3UploadError::Stat {
            path: job.path.clone(),
            source,
        })?;

    if metadata.is_dir() {
        debug!("Skipping directory {}", job.path);
        return Ok(UploadStatus::SkippedDirectory);
    }

    let key = config.keys.derive_key(&job.path);
    *key_out = Some(key.clone());
    let content_type = detect_content_type(path);

    if config.dry_run {
        info!(
            "DRY RUN: would upload {} to s3://{}/{} ({})",
            job.path, config.bucket, key, content_type
        );
        return Ok(UploadStatus::DryRun);
    }

    let io_err = |source: std::io::Error| S3UploadError::Io {
        path: job.path.clone(),
        source,
    };

    // Length comes from the open handle so it matches the bytes streamed
    let body = File::open(path).await.map_err(io_err)?;
    let content_length = body.metadata().await.map_err(io_err)?.len();

    let content_md5 = if config.checksum {
        let digest = digest_file(path).await?;
        info!("{} md5sum {}", job.path, digest);
        Some(digest.to_base64())
    } else {
        None
    };

    let request = PutObjectRequest {
        bucket: config.bucket.clone(),
        key: key.clone(),
        body,
        content_length,
        content_type,
        acl: config.acl.clone(),
        encryption: config.encryption,
        cache_control: config.cache_control.clone(),
        content_md5,
    };

    client
        .put_object(request)
        .await
        .map_err(|source| S3UploadError::Upload {
            path: job.path.clone(),
            bucket: config.bucket.clone(),
            key,
            source,
        })?;

    Ok(UploadStatus::Uploaded)
}
