//! Publish local files selected by glob patterns to an S3 bucket.
//!
//! The pipeline is: [`matcher`] expands the source pattern, [`dispatch`]
//! fans the paths out to a fixed worker pool, and each worker runs
//! [`s3::upload_file`] against a [`s3::StorageClient`].

pub mod config;
pub mod dispatch;
pub mod matcher;
pub mod s3;

pub use config::{Config, Encryption, UploadConfig};
pub use dispatch::{Dispatcher, RunReport};
pub use matcher::Matcher;
