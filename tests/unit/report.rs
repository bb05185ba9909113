use crate::discovery::Artifact;
use crate::orchestrator::FailureReason;
use crate::store::FingerprintStore;

use super::*;

fn batch(outcomes: Vec<(&str, RenderOutcome)>, skipped: &[&str]) -> BatchResult {
    BatchResult {
        store: FingerprintStore::new(),
        outcomes: outcomes
            .into_iter()
            .map(|(id, o)| (Artifact::new(id, id), o))
            .collect(),
        skipped: skipped.iter().map(|id| Artifact::new(*id, *id)).collect(),
        elapsed: Duration::from_millis(1500),
    }
}

fn nonzero() -> RenderOutcome {
    RenderOutcome::Failure {
        reason: FailureReason::NonzeroExit { code: Some(1) },
        diagnostic: "stderr: bad map".to_string(),
    }
}

#[test]
fn exit_codes() {
    assert_eq!(RunStatus::UpToDate.exit_code(), 0);
    assert_eq!(RunStatus::AllRendered.exit_code(), 0);
    assert_eq!(RunStatus::DryRun.exit_code(), 0);
    assert_eq!(RunStatus::Failures.exit_code(), 1);
    assert_eq!(RunStatus::Cancelled.exit_code(), 1);
}

#[test]
fn all_success_is_all_rendered() {
    let b = batch(
        vec![("a.yml", RenderOutcome::Success), ("b.yml", RenderOutcome::Success)],
        &[],
    );
    let s = RunSummary::from_batch(5, &b, 4, RunPaths::default());
    assert_eq!(s.status, RunStatus::AllRendered);
    assert_eq!((s.changed, s.succeeded, s.failed), (2, 2, 0));
    assert_eq!(s.removed_frames, 4);
    assert_eq!(s.exit_code(), 0);
}

#[test]
fn failures_are_listed_in_batch_order() {
    let b = batch(
        vec![
            ("dir/z.yml", nonzero()),
            ("dir/a.yml", RenderOutcome::Success),
            ("dir/m.yml", nonzero()),
        ],
        &[],
    );
    let s = RunSummary::from_batch(3, &b, 0, RunPaths::default());
    assert_eq!(s.status, RunStatus::Failures);
    let ids = s
        .failures
        .iter()
        .map(|f| f.identity.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["dir/z.yml", "dir/m.yml"]);
    assert_eq!(s.failures[0].name, "z");
    assert_eq!(s.failures[0].reason, "nonzero-exit (code 1)");

    let text = s.to_string();
    assert!(text.contains(" 1. z"));
    assert!(text.contains(" 2. m"));
    assert!(text.contains("Elapsed:           1.5s"));
}

#[test]
fn cancellation_wins_over_success() {
    let b = batch(vec![("a.yml", RenderOutcome::Success)], &["b.yml"]);
    let s = RunSummary::from_batch(2, &b, 0, RunPaths::default());
    assert_eq!(s.status, RunStatus::Cancelled);
    assert_eq!(s.changed, 2);
    assert_eq!(s.skipped, 1);
    assert_eq!(s.exit_code(), 1);
    assert!(s.to_string().contains("(cancelled)"));
}

#[test]
fn up_to_date_and_dry_run_texts() {
    let s = RunSummary::up_to_date(7, RunPaths::default());
    assert!(s.to_string().contains("All 7 artifacts are up to date"));

    let s = RunSummary::dry_run(7, vec!["a.yml".into(), "b.yml".into()], RunPaths::default());
    assert_eq!(s.changed, 2);
    let text = s.to_string();
    assert!(text.contains("2 of 7"));
    assert!(text.contains("  b.yml"));
}
