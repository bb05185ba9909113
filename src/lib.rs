//! Incremental batch renderer for shuttle map definitions.
//!
//! A run walks the map source roots, fingerprints every artifact (mtime, size, SHA-256),
//! and hands only the artifacts whose fingerprint changed since their last successful
//! render to the external map renderer, one invocation at a time. Successful renders
//! update the on-disk fingerprint store; failures are journaled and retried next run.
//!
//! - [`run`] drives a whole run from a [`RunConfig`]
//! - [`RenderOrchestrator`] renders an explicit batch through any [`ProcessRunner`]
//! - [`StoreFile`] / [`ErrorJournal`] own the two persisted files
#![forbid(unsafe_code)]

mod foundation;

pub mod cleanup;
pub mod config;
pub mod discovery;
pub mod fingerprint;
pub mod journal;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod staleness;
pub mod store;

pub use crate::foundation::error::{RenderError, RenderResult};

pub use crate::cleanup::{CleanupReport, remove_frame_files};
pub use crate::config::RunConfig;
pub use crate::discovery::{Artifact, Discovery, discover};
pub use crate::fingerprint::Fingerprint;
pub use crate::journal::{ErrorJournal, JournalEntry, Severity};
pub use crate::orchestrator::{
    BatchResult, CancelToken, FailureReason, OrchestratorOpts, RenderOrchestrator, RenderOutcome,
};
pub use crate::pipeline::{RunOptions, run};
pub use crate::report::{RunPaths, RunStatus, RunSummary};
pub use crate::runner::{
    ProcessOutput, ProcessRunner, RunError, ScriptedRunner, SystemRunner, ToolCommand,
};
pub use crate::staleness::{Changes, StaleArtifact, Staleness, StalenessReport, classify, detect};
pub use crate::store::{FingerprintStore, StoreFile, StoreFormat};
