use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

/// What a cleanup pass removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files removed per frame index.
    pub removed_per_frame: BTreeMap<u32, usize>,
    /// Matching files that could not be removed.
    pub failed: usize,
}

impl CleanupReport {
    pub fn removed(&self) -> usize {
        self.removed_per_frame.values().sum()
    }
}

/// Frame index of an intermediate output name like `ship-3.png`, if it is in `1..=max_frame`.
pub fn frame_index(file_name: &str, extension: &str, max_frame: u32) -> Option<u32> {
    let stem = file_name.strip_suffix(extension)?.strip_suffix('.')?;
    let (_, suffix) = stem.rsplit_once('-')?;
    let n = suffix.parse::<u32>().ok()?;
    // `-03` is not a frame file; the tool writes plain decimal suffixes.
    if n == 0 || n > max_frame || suffix != n.to_string() {
        return None;
    }
    Some(n)
}

/// Remove every `*-{1..=max_frame}.{extension}` file below `output_dir`.
///
/// Best-effort: unreadable directories and failed deletions are logged and counted,
/// never returned as errors.
#[tracing::instrument(skip_all, fields(dir = %output_dir.display()))]
pub fn remove_frame_files(output_dir: &Path, extension: &str, max_frame: u32) -> CleanupReport {
    let mut report = CleanupReport::default();
    if !output_dir.is_dir() {
        tracing::debug!("output directory missing, nothing to clean");
        return report;
    }

    for entry in WalkDir::new(output_dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry during cleanup");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(frame) = entry
            .file_name()
            .to_str()
            .and_then(|name| frame_index(name, extension, max_frame))
        else {
            continue;
        };

        match std::fs::remove_file(entry.path()) {
            Ok(()) => *report.removed_per_frame.entry(frame).or_default() += 1,
            Err(e) => {
                tracing::debug!(
                    path = %entry.path().display(),
                    error = %e,
                    "could not remove frame file"
                );
                report.failed += 1;
            }
        }
    }

    for (frame, count) in &report.removed_per_frame {
        tracing::info!(
            pattern = %format!("*-{frame}.{extension}"),
            count,
            "removed intermediate frames"
        );
    }
    report
}

#[cfg(test)]
#[path = "../tests/unit/cleanup.rs"]
mod tests;
