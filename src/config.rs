use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundation::error::{RenderError, RenderResult};

/// Fingerprint store file name inside the state directory.
pub const STORE_FILE_NAME: &str = "render_shuttles_info.json";
/// Error journal file name inside the state directory.
pub const JOURNAL_FILE_NAME: &str = "render_shuttles_errors.log";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);
pub const DEFAULT_CLEANUP_MAX_FRAME: u32 = 30;

/// Everything a run needs to know, resolved to concrete paths.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Working directory of the render tool.
    pub project_root: PathBuf,
    /// Logical root: artifact identities are relative to this directory.
    pub maps_root: PathBuf,
    /// Directories walked for artifacts. Missing ones are skipped.
    pub source_roots: Vec<PathBuf>,
    /// Artifact file extension, without the dot.
    pub extension: String,
    /// Name under which the tool sees `maps_root` (`-f <prefix>/<identity>`).
    pub maps_prefix: String,
    pub tool_path: PathBuf,
    pub output_dir: PathBuf,
    pub store_path: PathBuf,
    pub journal_path: PathBuf,
    pub timeout: Duration,
    /// Delay between two tool invocations.
    pub pacing: Duration,
    /// Frames `-1` through `-N` are removed from the output tree after the batch.
    pub cleanup_max_frame: u32,
    pub cleanup_extension: String,
    /// Persist the store after every successful render instead of once at the end.
    pub checkpoint: bool,
    /// Hashing pool size; `0` uses the rayon default.
    pub hash_threads: usize,
}

impl RunConfig {
    /// Reference layout rooted at `project_root`.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let maps_root = project_root.join("Resources").join("Maps");
        let tool_dir = project_root.join("bin").join("Content.MapRenderer");
        let state_dir = project_root.join("Tools").join("lua");

        Self {
            source_roots: vec![
                maps_root.join("_Lua").join("Shuttles"),
                maps_root.join("_Mono").join("Shuttles"),
            ],
            maps_root,
            extension: "yml".to_string(),
            maps_prefix: "Maps".to_string(),
            tool_path: tool_dir.join(default_tool_file_name()),
            output_dir: tool_dir.join("tmp"),
            store_path: state_dir.join(STORE_FILE_NAME),
            journal_path: state_dir.join(JOURNAL_FILE_NAME),
            project_root,
            timeout: DEFAULT_TIMEOUT,
            pacing: DEFAULT_PACING,
            cleanup_max_frame: DEFAULT_CLEANUP_MAX_FRAME,
            cleanup_extension: "png".to_string(),
            checkpoint: false,
            hash_threads: 0,
        }
    }

    /// Place the store and journal files in `dir`.
    pub fn with_state_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.store_path = dir.as_ref().join(STORE_FILE_NAME);
        self.journal_path = dir.as_ref().join(JOURNAL_FILE_NAME);
        self
    }

    pub fn with_tool_path(mut self, tool_path: impl Into<PathBuf>) -> Self {
        self.tool_path = tool_path.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_timing(mut self, timeout: Duration, pacing: Duration) -> Self {
        self.timeout = timeout;
        self.pacing = pacing;
        self
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.source_roots.is_empty() {
            return Err(RenderError::validation(
                "at least one source root is required",
            ));
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(RenderError::validation(
                "artifact extension must be non-empty and given without a leading dot",
            ));
        }
        if self.timeout.is_zero() {
            return Err(RenderError::validation("render timeout must be non-zero"));
        }
        if self.cleanup_max_frame == 0 {
            return Err(RenderError::validation(
                "cleanup frame bound must be at least 1",
            ));
        }
        if self.cleanup_extension.is_empty() {
            return Err(RenderError::validation(
                "cleanup extension must be non-empty",
            ));
        }
        Ok(())
    }
}

fn default_tool_file_name() -> &'static str {
    if cfg!(windows) {
        "Content.MapRenderer.exe"
    } else {
        "Content.MapRenderer"
    }
}
