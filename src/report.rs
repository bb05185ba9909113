use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::{BatchResult, RenderOutcome};

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing changed since the last successful render.
    UpToDate,
    /// Every changed artifact rendered.
    AllRendered,
    /// At least one changed artifact failed.
    Failures,
    /// The batch was stopped before every changed artifact was attempted.
    Cancelled,
    /// Changed artifacts were listed but not rendered.
    DryRun,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::UpToDate | Self::AllRendered | Self::DryRun => 0,
            Self::Failures | Self::Cancelled => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureLine {
    pub name: String,
    pub identity: String,
    pub reason: String,
}

/// Where the run's files live, for the summary footer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunPaths {
    pub output_dir: PathBuf,
    pub store: PathBuf,
    pub journal: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub discovered: usize,
    pub changed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    /// Failures in batch order.
    pub failures: Vec<FailureLine>,
    /// Changed artifacts not rendered (dry run), by identity.
    pub pending: Vec<String>,
    pub removed_frames: usize,
    pub paths: RunPaths,
}

impl RunSummary {
    pub fn up_to_date(discovered: usize, paths: RunPaths) -> Self {
        Self {
            status: RunStatus::UpToDate,
            discovered,
            changed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            elapsed: Duration::ZERO,
            failures: Vec::new(),
            pending: Vec::new(),
            removed_frames: 0,
            paths,
        }
    }

    pub fn dry_run(discovered: usize, pending: Vec<String>, paths: RunPaths) -> Self {
        Self {
            status: RunStatus::DryRun,
            changed: pending.len(),
            pending,
            ..Self::up_to_date(discovered, paths)
        }
    }

    pub fn from_batch(
        discovered: usize,
        batch: &BatchResult,
        removed_frames: usize,
        paths: RunPaths,
    ) -> Self {
        let failures = batch
            .outcomes
            .iter()
            .filter_map(|(artifact, outcome)| match outcome {
                RenderOutcome::Success => None,
                RenderOutcome::Failure { reason, .. } => Some(FailureLine {
                    name: artifact.display_name.clone(),
                    identity: artifact.identity.clone(),
                    reason: reason.to_string(),
                }),
            })
            .collect::<Vec<_>>();

        let status = if batch.was_cancelled() {
            RunStatus::Cancelled
        } else if failures.is_empty() {
            RunStatus::AllRendered
        } else {
            RunStatus::Failures
        };

        Self {
            status,
            discovered,
            changed: batch.outcomes.len() + batch.skipped.len(),
            succeeded: batch.success_count(),
            failed: failures.len(),
            skipped: batch.skipped.len(),
            elapsed: batch.elapsed,
            failures,
            pending: Vec::new(),
            removed_frames,
            paths,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

const RULE: &str = "============================================================";

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            RunStatus::UpToDate => {
                writeln!(
                    f,
                    "All {} artifacts are up to date; nothing to render.",
                    self.discovered
                )?;
                return writeln!(f, "Output directory: {}", self.paths.output_dir.display());
            }
            RunStatus::DryRun => {
                writeln!(
                    f,
                    "Dry run: {} of {} artifacts would be rendered:",
                    self.changed, self.discovered
                )?;
                for id in &self.pending {
                    writeln!(f, "  {id}")?;
                }
                return Ok(());
            }
            _ => {}
        }

        writeln!(f, "=== Render summary ===")?;
        writeln!(f, "Changed artifacts: {}", self.changed)?;
        writeln!(f, "Rendered:          {}", self.succeeded)?;
        writeln!(f, "Failed:            {}", self.failed)?;
        if self.skipped > 0 {
            writeln!(f, "Skipped:           {} (cancelled)", self.skipped)?;
        }
        writeln!(f, "Elapsed:           {:.1}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Frames cleaned:    {}", self.removed_frames)?;

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Render failures:")?;
            writeln!(f, "{RULE}")?;
            for (i, line) in self.failures.iter().enumerate() {
                writeln!(f, "{:2}. {}", i + 1, line.name)?;
                writeln!(f, "    path:   {}", line.identity)?;
                writeln!(f, "    reason: {}", line.reason)?;
            }
            writeln!(f, "{RULE}")?;
            writeln!(f, "Details: {}", self.paths.journal.display())?;
        }

        writeln!(f, "Fingerprints: {}", self.paths.store.display())?;
        writeln!(f, "Output:       {}", self.paths.output_dir.display())
    }
}

#[cfg(test)]
#[path = "../tests/unit/report.rs"]
mod tests;
