use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::Credentials,
    primitives::ByteStream,
    types::{ObjectCannedAcl, ServerSideEncryption},
};
use tokio::fs::File;
use tracing::{debug, warn};

use crate::config::{Config, Encryption};

/// A single PutObject call, with the body already opened
#[derive(Debug)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: File,
    pub content_length: u64,
    pub content_type: String,
    pub acl: Option<String>,
    pub encryption: Encryption,
    pub cache_control: Option<String>,
    /// Base64 MD5 of the body, sent as `Content-MD5`
    pub content_md5: Option<String>,
}

/// The one storage operation the upload pipeline needs.
///
/// Implementations are shared by every worker and must tolerate concurrent
/// calls.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;
}

/// S3 (or S3-compatible) storage backed by the AWS SDK
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub async fn new(config: &Config) -> Result<Self> {
        let mut aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(profile) = &config.profile {
            aws_config = aws_config.profile_name(profile);
        }

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                aws_config = aws_config.credentials_provider(Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "s3publish",
                ));
            }
            _ => warn!(
                "Access key and/or secret not provided, falling back to the default credential chain"
            ),
        }

        if let Some(endpoint) = &config.endpoint {
            aws_config = aws_config.endpoint_url(endpoint);
        }

        let sdk_config = aws_config.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }
}

#[async_trait]
impl StorageClient for S3Client {
    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        let PutObjectRequest {
            bucket,
            key,
            body,
            content_length,
            content_type,
            acl,
            encryption,
            cache_control,
            content_md5,
        } = request;

        let body = ByteStream::read_from()
            .file(body)
            .build()
            .await
            .context("Failed to create byte stream from file")?;

        let mut put = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(body)
            .content_length(content_length as i64)
            .content_type(content_type)
            .set_cache_control(cache_control)
            .set_content_md5(content_md5);

        if let Some(acl) = acl {
            put = put.acl(ObjectCannedAcl::from(acl.as_str()));
        }

        put = match encryption {
            Encryption::None => put,
            Encryption::Aes256 => put.server_side_encryption(ServerSideEncryption::Aes256),
            Encryption::Kms => put.server_side_encryption(ServerSideEncryption::AwsKms),
        };

        debug!("PutObject s3://{}/{} ({} bytes)", bucket, key, content_length);

        put.send().await.context("Failed to upload file to S3")?;

        Ok(())
    }
}
