use std::path::Path;

use crate::fingerprint::Fingerprint;
use crate::runner::{ProcessOutput, ScriptedRunner};
use crate::staleness::Changes;

use super::*;

struct Fixture {
    _dir: tempfile::TempDir,
    opts: OrchestratorOpts,
    journal: ErrorJournal,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("renderer");
    std::fs::write(&tool, b"").unwrap();
    let opts = OrchestratorOpts {
        tool_path: tool,
        output_dir: dir.path().join("out"),
        maps_prefix: "Maps".to_string(),
        working_dir: dir.path().to_path_buf(),
        timeout: Duration::from_secs(300),
        pacing: Duration::ZERO,
    };
    let journal = ErrorJournal::new(dir.path().join("errors.log"));
    Fixture {
        _dir: dir,
        opts,
        journal,
    }
}

fn stale(identity: &str, size: u64) -> StaleArtifact {
    StaleArtifact {
        artifact: Artifact::new(identity, Path::new("/maps").join(identity)),
        fingerprint: Fingerprint::new(1000.0, size, format!("hash-{identity}")),
        changes: Changes::default(),
    }
}

fn fails_for(
    identity: &'static str,
) -> impl Fn(&ToolCommand, Duration) -> Result<ProcessOutput, RunError> {
    move |cmd, _| {
        let target = format!("Maps/{identity}");
        if cmd.args.iter().any(|a| *a == *target) {
            Ok(ProcessOutput::failed(1, "", "bad map"))
        } else {
            Ok(ProcessOutput::success())
        }
    }
}

#[test]
fn command_follows_the_tool_contract() {
    let fx = fixture();
    let orch = RenderOrchestrator::new(ScriptedRunner::always_succeed(), fx.opts.clone());
    let cmd = orch.command_for(&Artifact::new("_Lua/Shuttles/a.yml", "/x/a.yml"));

    assert_eq!(cmd.program, fx.opts.tool_path);
    let args = cmd
        .args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(
        args,
        vec![
            "-o".to_string(),
            fx.opts.output_dir.display().to_string(),
            "-f".to_string(),
            "Maps/_Lua/Shuttles/a.yml".to_string(),
        ]
    );
    assert_eq!(cmd.current_dir.as_deref(), Some(fx.opts.working_dir.as_path()));
}

#[test]
fn outcome_classification() {
    assert_eq!(
        RenderOutcome::from_run(Ok(ProcessOutput::success())),
        RenderOutcome::Success
    );

    let RenderOutcome::Failure { reason, diagnostic } =
        RenderOutcome::from_run(Ok(ProcessOutput::failed(1, "", "bad map")))
    else {
        panic!("expected failure");
    };
    assert_eq!(reason, FailureReason::NonzeroExit { code: Some(1) });
    assert_eq!(reason.as_str(), "nonzero-exit");
    assert!(diagnostic.contains("bad map"));

    let RenderOutcome::Failure { reason, .. } = RenderOutcome::from_run(Err(RunError::TimedOut {
        after: Duration::from_secs(300),
    })) else {
        panic!("expected failure");
    };
    assert_eq!(reason.as_str(), "timeout");

    let RenderOutcome::Failure { reason, diagnostic } =
        RenderOutcome::from_run(Err(RunError::Invocation {
            program: "tool".into(),
            message: "permission denied".to_string(),
        }))
    else {
        panic!("expected failure");
    };
    assert_eq!(reason, FailureReason::Exception);
    assert!(diagnostic.contains("permission denied"));
}

#[test]
fn missing_tool_fails_before_any_invocation() {
    let mut fx = fixture();
    fx.opts.tool_path = fx.opts.working_dir.join("missing-renderer");
    let runner = ScriptedRunner::always_succeed();
    let orch = RenderOrchestrator::new(&runner, fx.opts);

    let err = orch
        .run_batch(vec![stale("a.yml", 1)], FingerprintStore::new(), &fx.journal)
        .unwrap_err();
    assert!(matches!(err, RenderError::ToolMissing { .. }));
    assert_eq!(runner.call_count(), 0);
}

#[test]
fn one_failure_does_not_stop_the_batch() {
    let fx = fixture();
    let runner = ScriptedRunner::new(fails_for("b.yml"));
    let orch = RenderOrchestrator::new(&runner, fx.opts.clone());

    let result = orch
        .run_batch(
            vec![stale("a.yml", 1), stale("b.yml", 2), stale("c.yml", 3)],
            FingerprintStore::new(),
            &fx.journal,
        )
        .unwrap();

    assert_eq!(runner.call_count(), 3);
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.outcomes[1].0.identity, "b.yml");
    assert!(!result.outcomes[1].1.is_success());

    assert!(result.store.contains("a.yml"));
    assert!(result.store.contains("c.yml"));
    assert!(!result.store.contains("b.yml"));

    let lines = fx.journal.read_lines().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("b.yml"));
    assert!(lines[0].contains("bad map"));
}

#[test]
fn failed_artifact_keeps_its_previous_entry() {
    let fx = fixture();
    let runner = ScriptedRunner::new(fails_for("b.yml"));
    let orch = RenderOrchestrator::new(&runner, fx.opts.clone());

    let old = Fingerprint::new(1.0, 1, "old");
    let mut store = FingerprintStore::new();
    store.record("b.yml", old.clone());

    let result = orch
        .run_batch(vec![stale("b.yml", 9)], store, &fx.journal)
        .unwrap();
    assert_eq!(result.store.get("b.yml"), Some(&old));
}

#[test]
fn success_records_the_probed_fingerprint_wholesale() {
    let fx = fixture();
    let orch = RenderOrchestrator::new(ScriptedRunner::always_succeed(), fx.opts.clone());

    let mut store = FingerprintStore::new();
    store.record("a.yml", Fingerprint::new(1.0, 1, "old"));
    let s = stale("a.yml", 42);
    let expected = s.fingerprint.clone();

    let result = orch.run_batch(vec![s], store, &fx.journal).unwrap();
    assert_eq!(result.store.get("a.yml"), Some(&expected));
    assert!(fx.journal.read_lines().unwrap().is_empty());
}

#[test]
fn timeout_is_contained() {
    let fx = fixture();
    let runner = ScriptedRunner::new(|cmd: &ToolCommand, timeout| {
        if cmd.args.iter().any(|a| a == "Maps/slow.yml") {
            Err(RunError::TimedOut { after: timeout })
        } else {
            Ok(ProcessOutput::success())
        }
    });
    let orch = RenderOrchestrator::new(&runner, fx.opts.clone());

    let result = orch
        .run_batch(
            vec![stale("slow.yml", 1), stale("next.yml", 1)],
            FingerprintStore::new(),
            &fx.journal,
        )
        .unwrap();

    assert_eq!(runner.call_count(), 2);
    let RenderOutcome::Failure { reason, diagnostic } = &result.outcomes[0].1 else {
        panic!("expected timeout failure");
    };
    assert_eq!(
        *reason,
        FailureReason::Timeout {
            after: Duration::from_secs(300)
        }
    );
    assert_eq!(diagnostic, "timed out after 300s");
    assert!(result.outcomes[1].1.is_success());
}

#[test]
fn cancelled_batch_skips_the_rest() {
    let fx = fixture();
    let cancel = CancelToken::new();
    let trip = cancel.clone();
    let runner = ScriptedRunner::new(move |_: &ToolCommand, _| {
        trip.cancel();
        Ok(ProcessOutput::success())
    });
    let orch = RenderOrchestrator::new(&runner, fx.opts.clone()).with_cancel(cancel);

    let result = orch
        .run_batch(
            vec![stale("a.yml", 1), stale("b.yml", 1), stale("c.yml", 1)],
            FingerprintStore::new(),
            &fx.journal,
        )
        .unwrap();

    assert_eq!(runner.call_count(), 1);
    assert!(result.was_cancelled());
    assert_eq!(result.outcomes.len(), 1);
    let skipped = result
        .skipped
        .iter()
        .map(|a| a.identity.as_str())
        .collect::<Vec<_>>();
    assert_eq!(skipped, vec!["b.yml", "c.yml"]);
    assert!(result.store.contains("a.yml"));
    assert_eq!(result.store.len(), 1);
}

#[test]
fn checkpoint_persists_after_each_success() {
    let fx = fixture();
    let store_file = StoreFile::new(fx.opts.working_dir.join("info.json"));
    let seen = store_file.clone();
    let runner = ScriptedRunner::new(move |cmd: &ToolCommand, _| {
        if cmd.args.iter().any(|a| a == "Maps/b.yml") {
            // a.yml was checkpointed before b.yml started.
            assert!(seen.load().unwrap().contains("a.yml"));
        }
        Ok(ProcessOutput::success())
    });
    let orch =
        RenderOrchestrator::new(&runner, fx.opts.clone()).with_checkpoint(store_file.clone());

    orch.run_batch(
        vec![stale("a.yml", 1), stale("b.yml", 1)],
        FingerprintStore::new(),
        &fx.journal,
    )
    .unwrap();
    assert_eq!(store_file.load().unwrap().len(), 2);
}

#[test]
fn empty_batch_still_checks_the_tool() {
    let fx = fixture();
    let orch = RenderOrchestrator::new(ScriptedRunner::always_succeed(), fx.opts.clone());
    let result = orch
        .run_batch(Vec::new(), FingerprintStore::new(), &fx.journal)
        .unwrap();
    assert!(result.outcomes.is_empty());
    assert!(!result.was_cancelled());
}

#[test]
fn failure_reason_display_is_readable() {
    assert_eq!(
        FailureReason::NonzeroExit { code: Some(3) }.to_string(),
        "nonzero-exit (code 3)"
    );
    assert_eq!(
        FailureReason::Timeout {
            after: Duration::from_secs(5)
        }
        .to_string(),
        "timeout (5s)"
    );
}
