//! Process-runner seam between the orchestrator and the external render tool.
//!
//! The orchestrator only ever sees [`ProcessRunner`]; [`SystemRunner`] spawns real
//! processes and [`ScriptedRunner`] answers from a closure for tests and dry wiring.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;

use wait_timeout::ChildExt as _;

/// A fully specified tool invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Space-joined command line, for logs and journal entries.
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for a in &self.args {
            out.push(' ');
            out.push_str(&a.to_string_lossy());
        }
        out
    }
}

/// What a finished process reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Captured output in the journal's `stdout: ..., stderr: ...` shape.
    pub fn diagnostic(&self) -> String {
        format!(
            "stdout: {}, stderr: {}",
            self.stdout.trim(),
            self.stderr.trim()
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("timed out after {}s", after.as_secs())]
    TimedOut { after: Duration },

    #[error("failed to invoke '{}': {message}", program.display())]
    Invocation { program: PathBuf, message: String },
}

/// Runs one command to completion or until `timeout` elapses.
pub trait ProcessRunner {
    fn run(&self, cmd: &ToolCommand, timeout: Duration) -> Result<ProcessOutput, RunError>;
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, cmd: &ToolCommand, timeout: Duration) -> Result<ProcessOutput, RunError> {
        (**self).run(cmd, timeout)
    }
}

/// Spawns the command with `std::process`, draining stdout/stderr on helper threads
/// while the calling thread waits with a deadline. A timed-out child is killed and reaped.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, cmd: &ToolCommand, timeout: Duration) -> Result<ProcessOutput, RunError> {
        let invocation = |e: std::io::Error| RunError::Invocation {
            program: cmd.program.clone(),
            message: e.to_string(),
        };

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &cmd.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(invocation)?;
        let stdout_drain = child.stdout.take().map(spawn_drain);
        let stderr_drain = child.stderr.take().map(spawn_drain);

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                // Drains are left to finish on their own: a grandchild may still hold the pipes.
                return Err(RunError::TimedOut { after: timeout });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(invocation(e));
            }
        };

        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout: join_drain(stdout_drain),
            stderr: join_drain(stderr_drain),
        })
    }
}

type Drain = std::thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_drain(mut pipe: impl Read + Send + 'static) -> Drain {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        pipe.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(drain: Option<Drain>) -> String {
    match drain.map(|h| h.join()) {
        Some(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
        Some(Ok(Err(e))) => format!("<failed to read output: {e}>"),
        Some(Err(_)) => "<output reader panicked>".to_string(),
        None => String::new(),
    }
}

/// Answers every invocation from a closure and records the commands it was given.
pub struct ScriptedRunner<F> {
    respond: F,
    calls: Mutex<Vec<ToolCommand>>,
}

impl<F> ScriptedRunner<F>
where
    F: Fn(&ToolCommand, Duration) -> Result<ProcessOutput, RunError>,
{
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Commands received so far, in call order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl ScriptedRunner<fn(&ToolCommand, Duration) -> Result<ProcessOutput, RunError>> {
    /// A runner whose every invocation exits 0.
    pub fn always_succeed() -> Self {
        Self::new(exit_zero)
    }
}

fn exit_zero(_: &ToolCommand, _: Duration) -> Result<ProcessOutput, RunError> {
    Ok(ProcessOutput::success())
}

impl<F> ProcessRunner for ScriptedRunner<F>
where
    F: Fn(&ToolCommand, Duration) -> Result<ProcessOutput, RunError>,
{
    fn run(&self, cmd: &ToolCommand, timeout: Duration) -> Result<ProcessOutput, RunError> {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(cmd.clone()),
            Err(poisoned) => poisoned.into_inner().push(cmd.clone()),
        }
        (self.respond)(cmd, timeout)
    }
}

/// `true` if `path` names an existing regular file.
pub fn tool_exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
#[path = "../tests/unit/runner.rs"]
mod tests;
