//! maildir-walker - Maildir structure monitor
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use maildir_walker::config::{CliArgs, MonitorConfig};
use maildir_walker::monitor::Monitor;
use maildir_walker::progress::{print_header, print_summary};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    let config = MonitorConfig::from_args(args).context("Invalid configuration")?;

    setup_logging(config.verbose)?;

    if config.show_progress {
        print_header(
            &config.maildir_root,
            config.debounce,
            config.metrics_file.as_deref(),
        );
    }

    let monitor = Monitor::new(config.clone());

    // Setup signal handler for graceful shutdown
    let shutdown_flag = monitor.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let summary = monitor.run().context("Monitor failed")?;

    if config.metrics_file.is_none() {
        print!("{}", monitor.registry().render());
    }

    if config.show_progress {
        print_summary(&summary);
    }

    if summary.failed > 0 {
        warn!(failed = summary.failed, "Some walkers stopped on errors");
    } else {
        info!("All walkers stopped cleanly");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("maildir_walker=debug,warn")
    } else {
        EnvFilter::new("maildir_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
