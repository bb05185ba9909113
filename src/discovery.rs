use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// One renderable source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// `/`-separated path relative to the logical root. Unique key.
    pub identity: String,
    /// File name without extension, for reports only.
    pub display_name: String,
    /// Physical location used for all I/O.
    pub location: PathBuf,
}

impl Artifact {
    pub fn new(identity: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        let identity = identity.into();
        let display_name = Path::new(&identity)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| identity.clone());
        Self {
            identity,
            display_name,
            location: location.into(),
        }
    }
}

/// Result of walking the source roots.
#[derive(Clone, Debug, Default)]
pub struct Discovery {
    /// Artifacts in walk order: roots in the order given, entries sorted by file name.
    pub artifacts: Vec<Artifact>,
    /// Roots that did not exist and were skipped.
    pub missing_roots: Vec<PathBuf>,
}

impl Discovery {
    pub fn all_roots_missing(&self, root_count: usize) -> bool {
        root_count > 0 && self.missing_roots.len() == root_count
    }
}

/// Enumerate every `*.{extension}` file below `roots`.
///
/// Identities are computed against `logical_root`, so moving a file between two
/// source roots under the same logical root keeps its identity only if its relative
/// path is unchanged. Roots outside `logical_root` fall back to root-relative identities.
#[tracing::instrument(skip(roots), fields(roots = roots.len()))]
pub fn discover(roots: &[PathBuf], logical_root: &Path, extension: &str) -> Discovery {
    let mut out = Discovery::default();
    let mut seen = BTreeSet::new();

    for root in roots {
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "source root not found, skipping");
            out.missing_roots.push(root.clone());
            continue;
        }

        tracing::info!(root = %root.display(), "scanning source root");
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
                continue;
            }

            let base = if entry.path().starts_with(logical_root) {
                logical_root
            } else {
                root.as_path()
            };
            let Some(identity) = identity_for(entry.path(), base) else {
                continue;
            };
            if !seen.insert(identity.clone()) {
                continue;
            }

            let artifact = Artifact::new(identity, entry.into_path());
            tracing::debug!(
                identity = %artifact.identity,
                name = %artifact.display_name,
                "found artifact"
            );
            out.artifacts.push(artifact);
        }
    }

    out
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|e| e == extension)
}

/// `/`-joined path of `path` relative to `base`.
pub(crate) fn identity_for(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
#[path = "../tests/unit/discovery.rs"]
mod tests;
