use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::s3::KeyMapper;

/// Canned ACLs accepted by S3 for PutObject
pub const CANNED_ACLS: &[&str] = &[
    "private",
    "public-read",
    "public-read-write",
    "authenticated-read",
    "aws-exec-read",
    "bucket-owner-read",
    "bucket-owner-full-control",
];

/// Server-side encryption mode requested for uploaded objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encryption {
    #[default]
    None,
    Aes256,
    Kms,
}

impl Encryption {
    /// Header value sent to S3, `None` when encryption is not requested
    pub fn as_header(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Aes256 => Some("AES256"),
            Self::Kms => Some("aws:kms"),
        }
    }
}

impl FromStr for Encryption {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Ok(Self::None),
            "AES256" => Ok(Self::Aes256),
            "aws:kms" => Ok(Self::Kms),
            other => anyhow::bail!(
                "PLUGIN_ENCRYPTION '{}' is not supported (use AES256 or aws:kms)",
                other
            ),
        }
    }
}

/// Full configuration for a publish run, including client settings
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub profile: Option<String>,
    pub bucket: String,
    pub acl: Option<String>,
    pub encryption: Encryption,
    pub cache_control: Option<String>,
    pub parallel: usize,
    pub source: String,
    pub target: String,
    pub target_key: Option<String>,
    pub strip_prefix: String,
    pub exclude: Vec<String>,
    pub path_style: bool,
    pub dry_run: bool,
    pub checksum: bool,
}

/// Immutable per-run snapshot read by every upload worker
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    pub bucket: String,
    pub keys: KeyMapper,
    pub acl: Option<String>,
    pub cache_control: Option<String>,
    pub encryption: Encryption,
    pub dry_run: bool,
    pub checksum: bool,
    pub parallelism: usize,
}

impl Config {
    /// Load configuration from `PLUGIN_*` environment variables and .env file
    ///
    /// Values are only parsed here; call [`Config::validate`] once any
    /// command-line overrides have been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("PLUGIN_{}", name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &str| -> Result<bool> {
            match get(name) {
                Some(v) => parse_bool(&v).with_context(|| format!("PLUGIN_{} is invalid", name)),
                None => Ok(false),
            }
        };

        let region = get("REGION").unwrap_or_else(|| "us-east-1".to_string());

        let parallel = match get("PARALLEL") {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("PLUGIN_PARALLEL '{}' is not a number", v))?,
            None => 0,
        };

        let encryption = get("ENCRYPTION").unwrap_or_default().parse()?;

        let exclude = get("EXCLUDE")
            .map(|v| {
                v.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            endpoint: get("ENDPOINT"),
            region,
            access_key: get("ACCESS_KEY"),
            secret_key: get("SECRET_KEY"),
            profile: get("PROFILE"),
            bucket: get("BUCKET").unwrap_or_default(),
            acl: get("ACCESS"),
            encryption,
            cache_control: get("CACHE_CONTROL"),
            parallel,
            source: get("SOURCE").unwrap_or_default(),
            target: get("TARGET").unwrap_or_default(),
            target_key: get("TARGET_KEY"),
            strip_prefix: get("STRIP_PREFIX").unwrap_or_default(),
            exclude,
            path_style: flag("PATH_STYLE")?,
            dry_run: flag("DRY_RUN")?,
            checksum: flag("MD5SHA")? || flag("CHECKSUM")?,
        })
    }

    /// Check required settings and validate what can be checked offline
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            anyhow::bail!("PLUGIN_BUCKET not found in environment or flags");
        }
        if self.source.is_empty() {
            anyhow::bail!("PLUGIN_SOURCE not found in environment or --source");
        }
        Self::validate_region(&self.region)?;
        Self::validate_bucket_name(&self.bucket)?;
        Self::validate_target_path(&self.target)?;
        if let Some(acl) = &self.acl {
            Self::validate_acl(acl)?;
        }
        Ok(())
    }

    /// Number of upload workers, defaulting to the logical CPU count
    pub fn parallelism(&self) -> usize {
        if self.parallel > 0 {
            self.parallel
        } else {
            default_parallelism()
        }
    }

    /// Snapshot the settings upload workers need
    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            bucket: self.bucket.clone(),
            keys: KeyMapper::new(
                self.target.clone(),
                self.strip_prefix.clone(),
                self.target_key.clone(),
            ),
            acl: self.acl.clone(),
            cache_control: self.cache_control.clone(),
            encryption: self.encryption,
            dry_run: self.dry_run,
            checksum: self.checksum,
            parallelism: self.parallelism(),
        }
    }

    /// Validate AWS region format
    fn validate_region(region: &str) -> Result<()> {
        if region.is_empty() {
            anyhow::bail!("PLUGIN_REGION cannot be empty");
        }

        // Basic validation - ensure it looks like a region (contains a dash)
        if !region.contains('-') {
            anyhow::bail!(
                "PLUGIN_REGION '{}' doesn't look like a valid region (e.g., us-west-2, eu-west-1)",
                region
            );
        }

        Ok(())
    }

    /// Validate S3 bucket name according to AWS rules
    fn validate_bucket_name(bucket: &str) -> Result<()> {
        if bucket.len() < 3 || bucket.len() > 63 {
            anyhow::bail!(
                "PLUGIN_BUCKET '{}' must be between 3 and 63 characters (got {})",
                bucket,
                bucket.len()
            );
        }

        let is_edge = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
        if !bucket.starts_with(is_edge) {
            anyhow::bail!(
                "PLUGIN_BUCKET '{}' must start with a lowercase letter or number",
                bucket
            );
        }
        if !bucket.ends_with(is_edge) {
            anyhow::bail!(
                "PLUGIN_BUCKET '{}' must end with a lowercase letter or number",
                bucket
            );
        }

        if let Some(c) = bucket
            .chars()
            .find(|&c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.')
        {
            anyhow::bail!(
                "PLUGIN_BUCKET '{}' contains invalid character '{}'. Only lowercase letters, numbers, hyphens, and periods are allowed",
                bucket,
                c
            );
        }

        if bucket.contains("..") {
            anyhow::bail!("PLUGIN_BUCKET '{}' cannot contain consecutive periods", bucket);
        }

        if bucket.split('.').all(|part| part.parse::<u8>().is_ok()) {
            anyhow::bail!(
                "PLUGIN_BUCKET '{}' cannot be formatted as an IP address",
                bucket
            );
        }

        Ok(())
    }

    /// Validate the target key prefix; a leading '/' is allowed and stripped later
    fn validate_target_path(path: &str) -> Result<()> {
        if path.contains("//") {
            anyhow::bail!(
                "PLUGIN_TARGET '{}' contains consecutive slashes (not allowed)",
                path
            );
        }

        if path.split('/').any(|segment| segment == "..") {
            anyhow::bail!("PLUGIN_TARGET '{}' contains '..' (not allowed)", path);
        }

        Ok(())
    }

    fn validate_acl(acl: &str) -> Result<()> {
        if !CANNED_ACLS.contains(&acl) {
            anyhow::bail!(
                "PLUGIN_ACCESS '{}' is not a canned ACL (expected one of: {})",
                acl,
                CANNED_ACLS.join(", ")
            );
        }
        Ok(())
    }
}

/// Logical CPU count, at least 1
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => anyhow::bail!("'{}' is not a boolean", other),
    }
}
