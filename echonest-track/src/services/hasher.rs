//! Content hashing
//!
//! The service identifies uploaded audio by the MD5 of the file bytes, so the
//! local cache uses the same digest as its key. The string form is always 32
//! lower-case hex characters; every byte is rendered with two digits, leading
//! zero included.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{AnalysisError, AnalysisResult};

/// Length of the canonical hex form
pub const CONTENT_HASH_LEN: usize = 32;

/// Canonical MD5 content hash of an audio file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Render a raw digest as zero-padded lower-case hex
    pub fn from_digest(digest: &[u8]) -> Self {
        let hex = digest.iter().map(|b| format!("{:02x}", b)).collect();
        ContentHash(hex)
    }

    /// Parse a hex string received from elsewhere (config, CLI, cache file name)
    pub fn parse(value: &str) -> AnalysisResult<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.len() != CONTENT_HASH_LEN || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AnalysisError::Parse(format!(
                "Not a {}-character hex MD5: {:?}",
                CONTENT_HASH_LEN, value
            )));
        }
        Ok(ContentHash(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// MD5 of in-memory bytes
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::from_digest(&Md5::digest(bytes))
}

/// MD5 of a file's full contents
///
/// The read and digest run on the blocking pool.
pub async fn hash_file(file_path: &Path) -> AnalysisResult<ContentHash> {
    let path_buf = file_path.to_path_buf();
    tracing::debug!(path = %path_buf.display(), "Calculating MD5 hash");

    let hash = tokio::task::spawn_blocking(move || -> AnalysisResult<ContentHash> {
        let bytes = std::fs::read(&path_buf).map_err(|e| {
            AnalysisError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {} for hashing: {}", path_buf.display(), e),
            ))
        })?;
        Ok(hash_bytes(&bytes))
    })
    .await
    .map_err(|e| AnalysisError::Internal(format!("Hash calculation task failed: {}", e)))??;

    tracing::debug!(path = %file_path.display(), md5 = %hash, "Calculated hash");
    Ok(hash)
}
