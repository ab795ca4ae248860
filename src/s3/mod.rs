pub mod checksum;
pub mod client;
pub mod error;
pub mod helpers;
pub mod key;
pub mod upload;

pub use checksum::{ContentDigest, digest_file};
pub use client::{PutObjectRequest, S3Client, StorageClient};
pub use error::S3UploadError;
pub use helpers::detect_content_type;
pub use key::KeyMapper;
pub use upload::{UploadJob, UploadResult, UploadStatus, upload_file};
