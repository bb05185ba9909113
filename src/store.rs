use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::foundation::error::{RenderError, RenderResult};

/// In-memory `identity -> Fingerprint` mapping.
///
/// Passed by value into the batch and handed back with the successful entries applied.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintStore {
    entries: BTreeMap<String, Fingerprint>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &str) -> Option<&Fingerprint> {
        self.entries.get(identity)
    }

    /// Replace the entry for `identity`. Returns the previous fingerprint, if any.
    pub fn record(
        &mut self,
        identity: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Option<Fingerprint> {
        self.entries.insert(identity.into(), fingerprint)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Fingerprint)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Fingerprint)> for FingerprintStore {
    fn from_iter<T: IntoIterator<Item = (String, Fingerprint)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// On-disk shape a store file was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFormat {
    /// Values are fingerprint objects.
    Structured,
    /// Values are bare modification timestamps.
    LegacyTimestamps,
}

/// Decode store bytes, upgrading the legacy shape in memory.
///
/// The structured shape is tried first; only if that fails is the whole document
/// reinterpreted as `identity -> timestamp`.
pub fn decode_store(bytes: &[u8]) -> Result<(FingerprintStore, StoreFormat), serde_json::Error> {
    let structured = match serde_json::from_slice::<FingerprintStore>(bytes) {
        Ok(store) => return Ok((store, StoreFormat::Structured)),
        Err(e) => e,
    };

    match serde_json::from_slice::<BTreeMap<String, f64>>(bytes) {
        Ok(legacy) => {
            let store = legacy
                .into_iter()
                .map(|(id, ts)| (id, Fingerprint::from_legacy_timestamp(ts)))
                .collect();
            Ok((store, StoreFormat::LegacyTimestamps))
        }
        Err(_) => Err(structured),
    }
}

/// The persisted fingerprint store at a fixed path.
#[derive(Clone, Debug)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the store. A missing file is an empty store; unreadable or undecodable
    /// content is an error the caller is expected to log and replace with an empty store.
    pub fn load(&self) -> RenderResult<FingerprintStore> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no fingerprint store yet");
                return Ok(FingerprintStore::new());
            }
            Err(e) => {
                return Err(RenderError::io(
                    format!("read fingerprint store '{}'", self.path.display()),
                    e,
                ));
            }
        };

        let (store, format) = decode_store(&bytes).map_err(|e| {
            RenderError::store(format!(
                "failed to decode '{}': {e}",
                self.path.display()
            ))
        })?;
        if format == StoreFormat::LegacyTimestamps {
            tracing::info!(
                entries = store.len(),
                "upgraded legacy timestamp-only fingerprint store"
            );
        }
        Ok(store)
    }

    /// Write the whole store through a temp file in the same directory, then rename
    /// over the previous file.
    pub fn save(&self, store: &FingerprintStore) -> RenderResult<()> {
        write_atomic(&self.path, store).map_err(|e| {
            RenderError::store(format!("failed to save '{}': {e:#}", self.path.display()))
        })?;
        tracing::debug!(
            path = %self.path.display(),
            entries = store.len(),
            "fingerprint store saved"
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, store: &FingerprintStore) -> anyhow::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create state directory '{}'", parent.display()))?;

    let json = serde_json::to_string_pretty(store).context("serialize fingerprint store")?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).context("create temp file")?;
    tmp.write_all(json.as_bytes()).context("write temp file")?;
    tmp.write_all(b"\n").context("write temp file")?;
    tmp.as_file().sync_all().context("sync temp file")?;
    tmp.persist(path).context("replace store file")?;
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/store.rs"]
mod tests;
