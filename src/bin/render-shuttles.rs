use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use render_shuttles::{CancelToken, RunConfig, RunOptions, SystemRunner};

/// Re-render every shuttle map whose source changed since its last successful render.
///
/// Every flag is optional; with none the reference project layout under the current
/// directory is used.
#[derive(Parser, Debug)]
#[command(name = "render-shuttles", version)]
struct Cli {
    /// Project root (tool working directory; `Resources/Maps` lives below it).
    #[arg(long, env = "RENDER_SHUTTLES_PROJECT_ROOT")]
    project_root: Option<PathBuf>,

    /// Render tool executable.
    #[arg(long, env = "RENDER_SHUTTLES_TOOL")]
    tool: Option<PathBuf>,

    /// Directory the tool writes into.
    #[arg(long, env = "RENDER_SHUTTLES_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory holding the fingerprint store and the error journal.
    #[arg(long, env = "RENDER_SHUTTLES_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Logical root artifact identities are relative to.
    #[arg(long)]
    maps_root: Option<PathBuf>,

    /// Source root to scan (repeatable; replaces the defaults).
    #[arg(long = "source-root")]
    source_roots: Vec<PathBuf>,

    /// Artifact file extension, without the dot.
    #[arg(long)]
    extension: Option<String>,

    /// Per-artifact render timeout in seconds.
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Pause between two tool invocations, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pacing_ms: u64,

    /// Highest intermediate frame suffix removed after the batch.
    #[arg(long, default_value_t = 30)]
    cleanup_max_frame: u32,

    /// Save the fingerprint store after every successful render.
    #[arg(long)]
    checkpoint: bool,

    /// Hashing threads (0 = one per core).
    #[arg(long, default_value_t = 0)]
    hash_threads: usize,

    /// Only list the artifacts that would be rendered.
    #[arg(long)]
    dry_run: bool,

    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        let project_root = match self.project_root {
            Some(p) => p,
            None => std::env::current_dir().context("resolve current directory")?,
        };

        let mut cfg = RunConfig::for_project(absolute(project_root)?).with_timing(
            Duration::from_secs(self.timeout_secs),
            Duration::from_millis(self.pacing_ms),
        );
        // The tool runs from the project root, so relative paths are fixed here first.
        if let Some(tool) = self.tool {
            cfg = cfg.with_tool_path(absolute(tool)?);
        }
        if let Some(dir) = self.output_dir {
            cfg = cfg.with_output_dir(absolute(dir)?);
        }
        if let Some(dir) = self.state_dir {
            cfg = cfg.with_state_dir(dir);
        }
        if let Some(root) = self.maps_root {
            cfg.maps_root = root;
        }
        if !self.source_roots.is_empty() {
            cfg.source_roots = self.source_roots;
        }
        if let Some(ext) = self.extension {
            cfg.extension = ext;
        }
        cfg.cleanup_max_frame = self.cleanup_max_frame;
        cfg.checkpoint = self.checkpoint;
        cfg.hash_threads = self.hash_threads;
        Ok(cfg)
    }
}

fn absolute(path: PathBuf) -> anyhow::Result<PathBuf> {
    std::path::absolute(&path).with_context(|| format!("resolve '{}'", path.display()))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "render_shuttles=debug"
    } else {
        "render_shuttles=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<u8> {
    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone())?;
    let opts = RunOptions {
        dry_run: cli.dry_run,
        cancel,
    };
    let cfg = cli.into_config()?;
    tracing::info!(project = %cfg.project_root.display(), "starting shuttle render");

    let summary = render_shuttles::run(&cfg, SystemRunner, &opts)?;
    print!("{summary}");
    Ok(if summary.exit_code() == 0 { 0 } else { 1 })
}

/// First Ctrl-C stops the batch after the current render; a second one exits at once.
///
/// Returns once the handler is registered, so an interrupt arriving during the run is
/// never lost to the default handler.
fn cancel_on_interrupt(cancel: CancelToken) -> anyhow::Result<()> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();
    std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            rt.block_on(async move {
                let mut interrupts = match interrupts() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                if interrupts.recv().await.is_none() {
                    return;
                }
                tracing::warn!("interrupt received, stopping after the current render");
                cancel.cancel();

                if interrupts.recv().await.is_some() {
                    tracing::error!("second interrupt, exiting without saving");
                    std::process::exit(130);
                }
            });
        })
        .context("spawn interrupt handler thread")?;

    ready_rx
        .recv()
        .context("interrupt handler thread exited early")?
        .context("register interrupt handler")
}

#[cfg(unix)]
fn interrupts() -> std::io::Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
}

#[cfg(windows)]
fn interrupts() -> std::io::Result<tokio::signal::windows::CtrlC> {
    tokio::signal::windows::ctrl_c()
}
