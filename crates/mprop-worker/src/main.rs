//! Mask propagation worker binary.
//!
//! Usage: `mprop-worker [leading args...] <descriptor-json>`
//!
//! Status lines go to stdout, logs to stderr. Exit code 0 means the masks were
//! written and `OUTPUT_PATH:` was reported.

use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mprop_media::SeedBoxPropagator;
use mprop_models::JobDescriptor;
use mprop_worker::{run_job, StatusReporter, WorkerConfig, WorkerError, WorkerResult};

fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let stdout = std::io::stdout();
    let mut reporter = StatusReporter::new(stdout.lock());

    match run(&mut reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Worker failed: {}", e);
            // Nothing more can be reported if stdout itself is gone.
            let _ = reporter.fatal(e.to_string());
            ExitCode::from(1)
        }
    }
}

fn run<W: std::io::Write>(reporter: &mut StatusReporter<W>) -> WorkerResult<()> {
    // The descriptor is the last argument; anything before it belongs to the launcher.
    let payload = std::env::args()
        .skip(1)
        .last()
        .ok_or(WorkerError::MissingDescriptor)?;

    let descriptor = JobDescriptor::from_json(&payload)?;
    let config = WorkerConfig::from_env();
    info!(job_id = %descriptor.job_id, "Starting mprop-worker");
    info!("Worker config: {:?}", config);

    run_job(&descriptor, &config, &mut SeedBoxPropagator, reporter)?;
    Ok(())
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
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
