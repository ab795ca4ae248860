use base64::{Engine as _, engine::general_purpose::STANDARD};
use md5::{Digest, Md5};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncReadExt;

use super::error::{Result, S3UploadError};

const BUFFER_SIZE: usize = 64 * 1024;

/// MD5 fingerprint of a file's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentDigest([u8; 16]);

impl ContentDigest {
    /// Lower-case hex form, as printed by `md5sum`
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Base64 form expected by the `Content-MD5` header
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Stream a file through MD5 without loading it into memory
pub async fn digest_file(path: &Path) -> Result<ContentDigest> {
    let io_err = |source: std::io::Error| S3UploadError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).await.map_err(io_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hasher.finalize());
    Ok(ContentDigest(bytes))
}
