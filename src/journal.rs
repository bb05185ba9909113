use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::foundation::error::{RenderError, RenderResult};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// The run was aborted.
    Fatal,
    /// One artifact failed to render.
    Error,
    /// A best-effort step failed; the run went on.
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warning => "WARN",
        }
    }
}

/// One journal line.
#[derive(Clone, Debug, PartialEq)]
pub struct JournalEntry {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
    pub artifact: Option<String>,
    pub details: Option<String>,
}

impl JournalEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            message: message.into(),
            artifact: None,
            details: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn with_artifact(mut self, identity: impl Into<String>) -> Self {
        self.artifact = Some(identity.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// `[ts] LEVEL message | artifact: id | details: text`, always a single line.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "[{}] {} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.severity.label(),
            single_line(&self.message)
        );
        if let Some(artifact) = self.artifact.as_deref().filter(|a| !a.is_empty()) {
            line.push_str(" | artifact: ");
            line.push_str(&single_line(artifact));
        }
        if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
            line.push_str(" | details: ");
            line.push_str(&single_line(details));
        }
        line
    }
}

fn single_line(s: &str) -> String {
    s.replace("\r\n", "\\n").replace(['\n', '\r'], "\\n")
}

/// Append-only failure log. The file is opened per entry and closed right after, so
/// entries written before a crash survive it.
#[derive(Clone, Debug)]
pub struct ErrorJournal {
    path: PathBuf,
}

impl ErrorJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &JournalEntry) -> RenderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RenderError::journal(format!("create '{}': {e}", parent.display()))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RenderError::journal(format!("open '{}': {e}", self.path.display())))?;

        let mut line = entry.to_line();
        line.push('\n');
        file.write_all(line.as_bytes())
            .map_err(|e| RenderError::journal(format!("write '{}': {e}", self.path.display())))
    }

    /// Append, logging instead of failing. Journal trouble never fails a run.
    pub fn append_or_log(&self, entry: &JournalEntry) {
        if let Err(e) = self.append(entry) {
            tracing::warn!(error = %e, message = %entry.message, "failed to write journal entry");
        }
    }

    /// All lines currently in the journal; empty if it does not exist.
    pub fn read_lines(&self) -> RenderResult<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(s.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(RenderError::journal(format!(
                "read '{}': {e}",
                self.path.display()
            ))),
        }
    }
}
