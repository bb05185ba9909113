use crate::cleanup::remove_frame_files;
use crate::config::RunConfig;
use crate::discovery::discover;
use crate::foundation::error::{RenderError, RenderResult};
use crate::journal::{ErrorJournal, JournalEntry};
use crate::orchestrator::{CancelToken, OrchestratorOpts, RenderOrchestrator};
use crate::report::{RunPaths, RunSummary};
use crate::runner::ProcessRunner;
use crate::staleness::detect;
use crate::store::{FingerprintStore, StoreFile};

/// Per-invocation switches that are not part of the project layout.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Stop after the staleness check and list what would be rendered.
    pub dry_run: bool,
    /// Checked before every tool invocation.
    pub cancel: CancelToken,
}

/// One full incremental render run.
///
/// Pipeline:
/// 1. validate the config and check the render tool exists
/// 2. load the fingerprint store (empty if missing or unreadable)
/// 3. discover artifacts and classify them against the store
/// 4. render changed artifacts one at a time through `runner`
/// 5. persist the store with the successful entries
/// 6. remove intermediate frame files from the output directory
///
/// Returns `Err` only for configuration problems, each of which is also written to the
/// journal as a fatal entry. Render failures end up in the returned [`RunSummary`].
#[tracing::instrument(skip_all, fields(project = %cfg.project_root.display()))]
pub fn run<R: ProcessRunner>(
    cfg: &RunConfig,
    runner: R,
    opts: &RunOptions,
) -> RenderResult<RunSummary> {
    let journal = ErrorJournal::new(&cfg.journal_path);
    let paths = RunPaths {
        output_dir: cfg.output_dir.clone(),
        store: cfg.store_path.clone(),
        journal: cfg.journal_path.clone(),
    };

    cfg.validate().map_err(|e| fatal(&journal, e))?;

    let store_file = StoreFile::new(&cfg.store_path);
    let mut orchestrator = RenderOrchestrator::new(runner, OrchestratorOpts::from_config(cfg))
        .with_cancel(opts.cancel.clone());
    if cfg.checkpoint {
        orchestrator = orchestrator.with_checkpoint(store_file.clone());
    }

    if !opts.dry_run {
        orchestrator.preflight().map_err(|e| fatal(&journal, e))?;
        std::fs::create_dir_all(&cfg.output_dir).map_err(|e| {
            fatal(
                &journal,
                RenderError::io(
                    format!("create output directory '{}'", cfg.output_dir.display()),
                    e,
                ),
            )
        })?;
        tracing::info!(dir = %cfg.output_dir.display(), "output directory ready");
    }

    let store = load_store(&store_file, &journal);
    tracing::info!(entries = store.len(), "loaded fingerprint store");

    let found = discover(&cfg.source_roots, &cfg.maps_root, &cfg.extension);
    if found.all_roots_missing(cfg.source_roots.len()) {
        return Err(fatal(
            &journal,
            RenderError::NoSourceRoots {
                roots: found.missing_roots,
            },
        ));
    }
    if found.artifacts.is_empty() {
        return Err(fatal(&journal, RenderError::NoArtifacts));
    }
    let discovered = found.artifacts.len();
    tracing::info!(count = discovered, "artifacts discovered");

    let staleness = detect(&found.artifacts, &store, cfg.hash_threads);
    if staleness.changed.is_empty() {
        tracing::info!("every artifact is up to date");
        return Ok(RunSummary::up_to_date(discovered, paths));
    }

    if opts.dry_run {
        let pending = staleness
            .changed
            .iter()
            .map(|s| s.artifact.identity.clone())
            .collect();
        return Ok(RunSummary::dry_run(discovered, pending, paths));
    }

    let batch = orchestrator
        .run_batch(staleness.changed, store, &journal)
        .map_err(|e| fatal(&journal, e))?;

    if batch.success_count() > 0 {
        if let Err(e) = store_file.save(&batch.store) {
            tracing::warn!(error = %e, "failed to save fingerprint store");
            journal.append_or_log(&JournalEntry::warning(e.to_string()));
        } else {
            tracing::info!(
                rendered = batch.success_count(),
                path = %store_file.path().display(),
                "fingerprint store updated"
            );
        }
    }

    let cleanup = remove_frame_files(
        &cfg.output_dir,
        &cfg.cleanup_extension,
        cfg.cleanup_max_frame,
    );
    if cleanup.failed > 0 {
        tracing::warn!(
            failed = cleanup.failed,
            "some intermediate frames could not be removed"
        );
        journal.append_or_log(
            &JournalEntry::warning(format!(
                "{} intermediate frame file(s) could not be removed",
                cleanup.failed
            ))
            .with_details(format!("output directory: {}", cfg.output_dir.display())),
        );
    }

    Ok(RunSummary::from_batch(
        discovered,
        &batch,
        cleanup.removed(),
        paths,
    ))
}

fn load_store(file: &StoreFile, journal: &ErrorJournal) -> FingerprintStore {
    match file.load() {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(error = %e, "fingerprint store unreadable, starting empty");
            journal.append_or_log(&JournalEntry::warning(format!(
                "fingerprint store unreadable, starting empty: {e}"
            )));
            FingerprintStore::new()
        }
    }
}

fn fatal(journal: &ErrorJournal, err: RenderError) -> RenderError {
    tracing::error!(error = %err, "run aborted");
    let mut entry = JournalEntry::fatal(err.to_string());
    if let RenderError::ToolMissing { path } = &err {
        entry = entry.with_details(format!("file not found: {}", path.display()));
    }
    journal.append_or_log(&entry);
    err
}
