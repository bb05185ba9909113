use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Read size used when streaming a file through the hasher.
pub const HASH_CHUNK_BYTES: usize = 64 * 1024;

/// Change-detection signals for one artifact at one point in time.
///
/// Replaced wholesale in the store, never patched field by field. The default value
/// (zero time, zero size, empty hash) stands in for "never rendered".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fingerprint {
    /// Last modification time, seconds since the Unix epoch.
    #[serde(alias = "timestamp")]
    pub modified_at: f64,
    #[serde(alias = "size")]
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the file content; empty when hashing failed.
    #[serde(alias = "hash")]
    pub content_hash: String,
}

impl Fingerprint {
    pub fn new(modified_at: f64, size_bytes: u64, content_hash: impl Into<String>) -> Self {
        Self {
            modified_at,
            size_bytes,
            content_hash: content_hash.into(),
        }
    }

    /// Upgrade a legacy bare-timestamp entry.
    pub fn from_legacy_timestamp(modified_at: f64) -> Self {
        Self {
            modified_at,
            size_bytes: 0,
            content_hash: String::new(),
        }
    }

    /// First 8 chars of the hash, for narration. Store files are not trusted to hold
    /// hex, so the cut is made on a char boundary.
    pub fn short_hash(&self) -> &str {
        match self.content_hash.char_indices().nth(8) {
            Some((end, _)) => &self.content_hash[..end],
            None => &self.content_hash,
        }
    }

    /// Current fingerprint of the file at `path`.
    ///
    /// Never fails: unreadable metadata yields the default fingerprint, and a hashing
    /// error leaves `content_hash` empty. Either way the artifact compares as changed
    /// against any real stored fingerprint.
    pub fn probe(path: &Path) -> Self {
        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read file metadata");
                return Self::default();
            }
        };

        let modified_at = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let content_hash = match hash_file(path) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to hash file");
                String::new()
            }
        };

        Self {
            modified_at,
            size_bytes: meta.len(),
            content_hash,
        }
    }
}

/// Stream `path` through SHA-256 in [`HASH_CHUNK_BYTES`] reads.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    hash_reader(&mut file)
}

pub fn hash_reader(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
#[path = "../tests/unit/fingerprint.rs"]
mod tests;
