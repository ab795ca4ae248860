use thiserror::Error;

/// Errors that can occur while matching and uploading files
#[derive(Error, Debug)]
pub enum S3UploadError {
    /// Glob pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Filesystem walk failed while expanding a pattern
    #[error("Failed to traverse '{path}' for pattern '{pattern}': {source}")]
    Traversal {
        pattern: String,
        path: String,
        #[source]
        source: walkdir::Error,
    },

    /// Matched path could no longer be stat'ed
    #[error("Failed to stat {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Open or read failure on a local file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Storage service rejected the request
    #[error("Could not upload file {path} to {bucket}/{key}: {source:#}")]
    Upload {
        path: String,
        bucket: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Run was cancelled before this job touched the filesystem
    #[error("Cancelled before upload started: {path}")]
    Cancelled { path: String },
}

impl S3UploadError {
    /// Short, stable label for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pattern { .. } | Self::Traversal { .. } => "pattern",
            Self::Stat { .. } => "stat",
            Self::Io { .. } => "io",
            Self::Upload { .. } => "upload",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Whether this error aborts the whole run rather than a single job
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Pattern { .. } | Self::Traversal { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::Pattern { pattern, source } => {
                format!(
                    "Invalid glob pattern '{}': {}\n\nPossible solutions:\n  \
                     1. Check for unbalanced braces or brackets\n  \
                     2. Quote the pattern so the shell does not expand it",
                    pattern, source
                )
            }
            Self::Traversal { path, .. } => {
                format!(
                    "{}\n\nPossible solutions:\n  \
                     1. Check directory permissions: ls -ld {}\n  \
                     2. Narrow the pattern to directories you can read",
                    self, path
                )
            }
            Self::Upload { bucket, .. } => {
                format!(
                    "{}\n\nPossible solutions:\n  \
                     1. Check your credentials: aws sts get-caller-identity\n  \
                     2. Verify write permissions on bucket '{}'\n  \
                     3. Check the endpoint and region settings\n  \
                     4. Set PLUGIN_PATH_STYLE=true for MinIO and other non-AWS endpoints",
                    self, bucket
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for S3 upload operations
pub type Result<T> = std::result::Result<T, S3UploadError>;
