//! Keeps the embed engine injected into a running desktop host.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tana_tweaks::runner::{self, RunnerConfig};
use tracing_subscriber::EnvFilter;

/// Attach to a host over its remote debugging port and inject engine scripts
/// after every load.
#[derive(Parser, Debug)]
#[command(name = "tana-tweaks-runner", version)]
#[command(about = "Inject link embeds into a running desktop host", long_about = None)]
struct Args {
    /// Remote debugging port on localhost.
    #[arg(long, default_value_t = 9222)]
    port: u16,

    /// Substring of the page URL to attach to.
    #[arg(long, default_value = "app.tana.inc")]
    target: String,

    /// Engine script to evaluate after the storage shim. Repeatable; runs in order.
    #[arg(long = "script", required = true)]
    scripts: Vec<PathBuf>,

    /// Milliseconds between discovery attempts.
    #[arg(long, default_value_t = 2000)]
    retry_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = RunnerConfig::new()
        .port(args.port)
        .target(args.target)
        .retry_interval(Duration::from_millis(args.retry_ms));

    for path in &args.scripts {
        match tokio::fs::read_to_string(path).await {
            Ok(source) => config = config.script(path.display().to_string(), source),
            Err(e) => {
                tracing::error!("Cannot read {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    tokio::select! {
        result = runner::run(config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!("Runner stopped: {e}");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping");
            ExitCode::SUCCESS
        }
    }
}
