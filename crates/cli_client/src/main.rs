//! Terminal viewer for the Eldia QR code
//! Spinner while the pipeline runs, then the code in Unicode blocks.

mod spinner;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use eldia_core::{Pipeline, PipelineOutcome};
use spinner::Spinner;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Eldia - show your loyalty card QR code in the terminal
#[derive(Parser, Debug)]
#[command(name = "eldia")]
#[command(author = "Eldia Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch the loyalty card token and display it as a QR code", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Disable the loading animation (for non-TTY output)
    #[arg(long, default_value_t = false)]
    no_spinner: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    setup_logging(&args.log_level)?;

    info!("Starting Eldia viewer v{}", env!("CARGO_PKG_VERSION"));

    let pipeline = Pipeline::builtin().context("Failed to create HTTP client")?;
    let handle = pipeline.spawn();
    let mut view = handle.view();

    let spinner = (!args.no_spinner).then(|| Spinner::start(handle.stage_receiver()));

    let matrix = tokio::select! {
        matrix = view.wait_ready() => matrix,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, cancelling...");
            handle.cancel();
            None
        }
    };

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    if let Some(matrix) = matrix {
        let fetched_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        println!("============================================");
        println!("Scan at the till ({})", fetched_at);
        println!();
        println!("{}", matrix.to_terminal());
        println!("============================================");
    }

    let outcome = handle.join().await;
    info!("Pipeline finished: {:?}", outcome);

    match outcome {
        PipelineOutcome::Ready => Ok(ExitCode::SUCCESS),
        PipelineOutcome::Cancelled => Ok(ExitCode::from(130)),
        PipelineOutcome::Failed(reason) => {
            warn!("No QR code available: {:?}", reason);
            eprintln!("No QR code available. Run with --log-level debug for details.");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Setup logging with tracing
fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::WARN);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["eldia"]);
        assert_eq!(args.log_level, "warn");
        assert!(!args.no_spinner);
    }

    #[test]
    fn test_args_flags() {
        let args = Args::parse_from(["eldia", "--log-level", "debug", "--no-spinner"]);
        assert_eq!(args.log_level, "debug");
        assert!(args.no_spinner);
    }
}
