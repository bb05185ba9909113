use std::path::PathBuf;

/// Crate-wide result alias.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that abort a run (or a best-effort step that the caller chooses to log).
///
/// Per-artifact render failures are not errors: they are reported as
/// [`crate::RenderOutcome::Failure`] values and never stop a batch.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render tool not found: '{}' (build the project first)", path.display())]
    ToolMissing { path: PathBuf },

    #[error("none of the source roots exist: {}", display_paths(roots))]
    NoSourceRoots { roots: Vec<PathBuf> },

    #[error("no artifacts found under the source roots")]
    NoArtifacts,

    #[error("io error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("journal error: {0}")]
    Journal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn journal(msg: impl Into<String>) -> Self {
        Self::Journal(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Configuration errors end the run before any artifact is attempted.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::ToolMissing { .. }
                | Self::NoSourceRoots { .. }
                | Self::NoArtifacts
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}
