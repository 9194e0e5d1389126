//! Command-line host for mask propagation jobs.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mprop_controller::{ControllerConfig, JobOutcome, SelectionRequest, WorkerController};
use mprop_models::{JobDescriptor, ModelSize, OutputEncoding, SeedRegion, WorkerEvent};

#[derive(Parser, Debug)]
#[command(name = "mprop", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Propagate a seed box through a frame range and write mask frames.
    Run(RunArgs),
    /// Print the JSON schema of the worker job descriptor.
    Schema,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Source sequence, e.g. `/plates/shot.%04d.png`.
    #[arg(long)]
    source: String,

    /// Output mask sequence, e.g. `/masks/shot_mask.####.png`.
    #[arg(long)]
    output: String,

    /// Seed box on the reference frame as `x,y,width,height`.
    #[arg(long, value_parser = parse_seed)]
    seed: SeedRegion,

    /// Inclusive frame range as `min-max`.
    #[arg(long, value_parser = parse_range)]
    range: (u32, u32),

    /// Frame the seed box was drawn on.
    #[arg(long)]
    reference: u32,

    #[arg(long, default_value_t = 24.0)]
    target_fps: f64,

    #[arg(long, default_value_t = 24.0)]
    original_fps: f64,

    /// Source bit depth, e.g. "16-bit half float". Inferred from the source extension when omitted.
    #[arg(long)]
    bit_depth: Option<String>,

    /// Model size: tiny, small, base+ or large.
    #[arg(long, default_value = "large")]
    model: ModelSize,

    /// Mask encoding; defaults to the output extension.
    #[arg(long)]
    encoding: Option<OutputEncoding>,

    /// Worker executable (overrides MPROP_WORKER).
    #[arg(long)]
    worker: Option<PathBuf>,

    /// Model repository (overrides MPROP_MODEL_REPO).
    #[arg(long)]
    model_repo: Option<PathBuf>,

    /// Kill the worker after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args).await,
        Command::Schema => cmd_schema(),
    }
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = ControllerConfig::from_env();
    if let Some(worker) = args.worker {
        config = config.with_worker(worker, Vec::new());
    }
    if let Some(repo) = args.model_repo {
        config.model_repo = repo;
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let request = SelectionRequest {
        source: args.source,
        output: args.output,
        seed: args.seed,
        frame_min: args.range.0,
        frame_max: args.range.1,
        reference_frame: args.reference,
        target_fps: args.target_fps,
        original_fps: args.original_fps,
        bit_depth: args.bit_depth,
        model: args.model,
        output_encoding: args.encoding,
    };
    let descriptor = request
        .into_descriptor(config.model_repo.clone())
        .context("invalid selection")?;

    let controller = WorkerController::new(config);
    let mut handle = controller.start(descriptor).context("start job")?;
    info!(job_id = %handle.job_id(), "Job started");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => relay(&event),
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = handle.cancel() {
                    warn!("Cannot cancel: {}", e);
                }
            }
        }
    }

    match handle.wait().await {
        JobOutcome::Completed(report) => {
            println!("Masks written to {}", report.output_path.display());
            Ok(ExitCode::SUCCESS)
        }
        JobOutcome::Cancelled => {
            eprintln!("cancelled");
            Ok(ExitCode::from(130))
        }
        JobOutcome::Failed(e) => {
            error!(kind = e.kind(), "{}", e);
            Ok(ExitCode::from(1))
        }
    }
}

fn cmd_schema() -> anyhow::Result<ExitCode> {
    let schema = serde_json::to_string_pretty(&JobDescriptor::json_schema())?;
    println!("{}", schema);
    Ok(ExitCode::SUCCESS)
}

fn relay(event: &WorkerEvent) {
    match event {
        WorkerEvent::Stage(text) => println!("{}", text),
        WorkerEvent::Progress(percent) => println!("{:>3}%", percent),
        WorkerEvent::OutputPath(_) | WorkerEvent::Fatal(_) => println!("{}", event.encode()),
        WorkerEvent::Diagnostic(_) => {}
    }
}

fn parse_seed(s: &str) -> Result<SeedRegion, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid seed '{}': {}", s, e))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(SeedRegion::new(*x, *y, *w, *h)),
        _ => Err(format!("seed must be x,y,width,height, got '{}'", s)),
    }
}

fn parse_range(s: &str) -> Result<(u32, u32), String> {
    let (min, max) = s
        .split_once('-')
        .ok_or_else(|| format!("range must be min-max, got '{}'", s))?;
    let min = min.trim().parse().map_err(|e| format!("invalid range start '{}': {}", min, e))?;
    let max = max.trim().parse().map_err(|e| format!("invalid range end '{}': {}", max, e))?;
    Ok((min, max))
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "mprop=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_target(false),
            )
            .with(env_filter)
            .init();
    }
}
