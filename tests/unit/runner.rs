use super::*;

#[test]
fn command_display_joins_program_and_args() {
    let cmd = ToolCommand::new("bin/renderer")
        .arg("-o")
        .arg("out")
        .arg("-f")
        .arg("Maps/a.yml");
    assert_eq!(cmd.display(), "bin/renderer -o out -f Maps/a.yml");
}

#[test]
fn diagnostic_contains_both_streams() {
    let out = ProcessOutput::failed(1, "loading\n", "bad map\n");
    assert!(!out.is_success());
    assert_eq!(out.diagnostic(), "stdout: loading, stderr: bad map");
}

#[test]
fn scripted_runner_records_calls_in_order() {
    let runner = ScriptedRunner::new(|cmd: &ToolCommand, _| {
        if cmd.args.iter().any(|a| a == "Maps/b.yml") {
            Ok(ProcessOutput::failed(2, "", "nope"))
        } else {
            Ok(ProcessOutput::success())
        }
    });

    let a = ToolCommand::new("t").arg("Maps/a.yml");
    let b = ToolCommand::new("t").arg("Maps/b.yml");
    assert!(runner.run(&a, Duration::from_secs(1)).unwrap().is_success());
    assert_eq!(
        runner.run(&b, Duration::from_secs(1)).unwrap().exit_code,
        Some(2)
    );
    assert_eq!(runner.calls(), vec![a, b]);
}

#[test]
fn missing_program_is_an_invocation_error() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = ToolCommand::new(dir.path().join("does-not-exist"));
    let err = SystemRunner.run(&cmd, Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, RunError::Invocation { .. }));
    assert!(err.to_string().contains("does-not-exist"));
}

#[test]
fn timed_out_display_states_the_limit() {
    let err = RunError::TimedOut {
        after: Duration::from_secs(300),
    };
    assert_eq!(err.to_string(), "timed out after 300s");
}

#[cfg(unix)]
mod unix {
    use super::*;

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("/bin/sh").arg("-c").arg(script)
    }

    #[test]
    fn captures_exit_code_and_streams() {
        let out = SystemRunner
            .run(&sh("echo out; echo err >&2; exit 3"), Duration::from_secs(10))
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn runs_in_the_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemRunner
            .run(&sh("pwd").current_dir(dir.path()), Duration::from_secs(10))
            .unwrap();
        assert!(out.is_success());
        let reported = std::fs::canonicalize(out.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn slow_process_is_killed_at_the_deadline() {
        let started = std::time::Instant::now();
        let err = SystemRunner
            .run(&sh("exec sleep 30"), Duration::from_millis(200))
            .unwrap_err();
        assert_eq!(
            err,
            RunError::TimedOut {
                after: Duration::from_millis(200)
            }
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
