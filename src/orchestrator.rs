//! Serialized render batch.
//!
//! Each changed artifact gets exactly one tool invocation. Whatever happens to one
//! invocation (non-zero exit, timeout, failure to spawn) becomes a
//! [`RenderOutcome::Failure`] for that artifact and the loop moves on. Only artifacts
//! whose outcome is [`RenderOutcome::Success`] get their fingerprint recorded.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::RunConfig;
use crate::discovery::Artifact;
use crate::foundation::error::{RenderError, RenderResult};
use crate::journal::{ErrorJournal, JournalEntry};
use crate::runner::{ProcessOutput, ProcessRunner, RunError, ToolCommand, tool_exists};
use crate::staleness::StaleArtifact;
use crate::store::{FingerprintStore, StoreFile};

/// Why one artifact failed to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    Timeout { after: Duration },
    NonzeroExit { code: Option<i32> },
    Exception,
}

impl FailureReason {
    /// Stable machine tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::NonzeroExit { .. } => "nonzero-exit",
            Self::Exception => "exception",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after } => write!(f, "timeout ({}s)", after.as_secs()),
            Self::NonzeroExit { code: Some(code) } => write!(f, "nonzero-exit (code {code})"),
            Self::NonzeroExit { code: None } => write!(f, "nonzero-exit (killed by signal)"),
            Self::Exception => f.write_str("exception"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Success,
    Failure {
        reason: FailureReason,
        diagnostic: String,
    },
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Classify what the runner reported.
    pub fn from_run(result: Result<ProcessOutput, RunError>) -> Self {
        match result {
            Ok(out) if out.is_success() => Self::Success,
            Ok(out) => Self::Failure {
                reason: FailureReason::NonzeroExit {
                    code: out.exit_code,
                },
                diagnostic: out.diagnostic(),
            },
            Err(e @ RunError::TimedOut { after }) => Self::Failure {
                reason: FailureReason::Timeout { after },
                diagnostic: e.to_string(),
            },
            Err(e @ RunError::Invocation { .. }) => Self::Failure {
                reason: FailureReason::Exception,
                diagnostic: e.to_string(),
            },
        }
    }
}

/// Cooperative stop signal, checked before every invocation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct OrchestratorOpts {
    pub tool_path: PathBuf,
    pub output_dir: PathBuf,
    /// Tool-side name of the maps root; the tool receives `-f <prefix>/<identity>`.
    pub maps_prefix: String,
    /// Working directory of every invocation.
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub pacing: Duration,
}

impl OrchestratorOpts {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            tool_path: cfg.tool_path.clone(),
            output_dir: cfg.output_dir.clone(),
            maps_prefix: cfg.maps_prefix.clone(),
            working_dir: cfg.project_root.clone(),
            timeout: cfg.timeout,
            pacing: cfg.pacing,
        }
    }
}

/// Everything a batch produced. `store` is the input store with successes applied.
#[derive(Clone, Debug)]
pub struct BatchResult {
    pub store: FingerprintStore,
    /// One entry per attempted artifact, in batch order.
    pub outcomes: Vec<(Artifact, RenderOutcome)>,
    /// Artifacts never attempted because the batch was cancelled.
    pub skipped: Vec<Artifact>,
    pub elapsed: Duration,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.skipped.is_empty()
    }
}

pub struct RenderOrchestrator<R> {
    runner: R,
    opts: OrchestratorOpts,
    cancel: CancelToken,
    checkpoint: Option<StoreFile>,
}

impl<R: ProcessRunner> RenderOrchestrator<R> {
    pub fn new(runner: R, opts: OrchestratorOpts) -> Self {
        Self {
            runner,
            opts,
            cancel: CancelToken::new(),
            checkpoint: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Save the store to `file` after every successful render.
    pub fn with_checkpoint(mut self, file: StoreFile) -> Self {
        self.checkpoint = Some(file);
        self
    }

    pub fn opts(&self) -> &OrchestratorOpts {
        &self.opts
    }

    /// Fails with [`RenderError::ToolMissing`] unless the tool executable exists.
    pub fn preflight(&self) -> RenderResult<()> {
        if tool_exists(&self.opts.tool_path) {
            Ok(())
        } else {
            Err(RenderError::ToolMissing {
                path: self.opts.tool_path.clone(),
            })
        }
    }

    /// `<tool> -o <output_dir> -f <prefix>/<identity>`, run from the working directory.
    pub fn command_for(&self, artifact: &Artifact) -> ToolCommand {
        ToolCommand::new(&self.opts.tool_path)
            .arg("-o")
            .arg(&self.opts.output_dir)
            .arg("-f")
            .arg(format!("{}/{}", self.opts.maps_prefix, artifact.identity))
            .current_dir(&self.opts.working_dir)
    }

    pub fn render_one(&self, artifact: &Artifact) -> RenderOutcome {
        let cmd = self.command_for(artifact);
        tracing::debug!(command = %cmd.display(), "invoking render tool");
        RenderOutcome::from_run(self.runner.run(&cmd, self.opts.timeout))
    }

    /// Render `batch` in order, one invocation at a time.
    ///
    /// Fails only on the preflight check; per-artifact failures are journaled and
    /// returned as outcomes.
    #[tracing::instrument(skip_all, fields(batch = batch.len()))]
    pub fn run_batch(
        &self,
        batch: Vec<StaleArtifact>,
        mut store: FingerprintStore,
        journal: &ErrorJournal,
    ) -> RenderResult<BatchResult> {
        self.preflight()?;

        let started = Instant::now();
        let total = batch.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut skipped = Vec::new();
        let mut pending = batch.into_iter().enumerate();

        while let Some((i, stale)) = pending.next() {
            if self.cancel.is_cancelled() {
                tracing::warn!(remaining = total - i, "batch cancelled");
                skipped.push(stale.artifact);
                skipped.extend(pending.by_ref().map(|(_, s)| s.artifact));
                break;
            }
            if i > 0 && !self.opts.pacing.is_zero() {
                std::thread::sleep(self.opts.pacing);
            }

            let StaleArtifact {
                artifact,
                fingerprint,
                ..
            } = stale;
            tracing::info!(
                "[{}/{}] rendering {} ({})",
                i + 1,
                total,
                artifact.display_name,
                artifact.identity
            );

            let outcome = self.render_one(&artifact);
            match &outcome {
                RenderOutcome::Success => {
                    tracing::info!(name = %artifact.display_name, "rendered");
                    store.record(artifact.identity.clone(), fingerprint);
                    self.save_checkpoint(&store, journal);
                }
                RenderOutcome::Failure { reason, diagnostic } => {
                    tracing::warn!(
                        name = %artifact.display_name,
                        reason = %reason,
                        diagnostic = %diagnostic,
                        "render failed"
                    );
                    journal.append_or_log(
                        &JournalEntry::error(format!(
                            "render failed ({}): {}",
                            reason.as_str(),
                            artifact.identity
                        ))
                        .with_artifact(artifact.identity.clone())
                        .with_details(diagnostic.clone()),
                    );
                }
            }
            outcomes.push((artifact, outcome));
        }

        Ok(BatchResult {
            store,
            outcomes,
            skipped,
            elapsed: started.elapsed(),
        })
    }

    fn save_checkpoint(&self, store: &FingerprintStore, journal: &ErrorJournal) {
        let Some(file) = &self.checkpoint else {
            return;
        };
        if let Err(e) = file.save(store) {
            tracing::warn!(error = %e, "checkpoint save failed");
            journal.append_or_log(&JournalEntry::warning(e.to_string()));
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/orchestrator.rs"]
mod tests;
