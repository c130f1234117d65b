mod args;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ordinal_db::{Orchestrator, TracingReporter};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command, LogFormat};

/// Exit status for bad flags, config files or migration filenames.
const EXIT_CONFIG: u8 = 2;
/// Exit status for connection, ledger and execution failures.
const EXIT_FAILURE: u8 = 1;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = match cli.migrate.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    info!(
        db = %config.db.display(),
        folder = %config.folder.display(),
        table = %config.table,
        split = %config.split,
        "starting ordinal"
    );

    let reporter = TracingReporter;
    let mut orchestrator = Orchestrator::new(config, &reporter);

    // Orchestrator failures have already gone through the reporter.
    match execute(cli.command.unwrap_or(Command::Run), &mut orchestrator) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.downcast_ref::<ordinal_common::Error>().is_none() {
                error!("{e:#}");
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

fn execute(command: Command, orchestrator: &mut Orchestrator<'_>) -> Result<()> {
    match command {
        Command::Run => {
            orchestrator.run()?;
        }
        Command::Status { json } => {
            let status = orchestrator.status()?;
            let rendered = if json {
                output::render_status_json(&status)?
            } else {
                output::render_status(&status)
            };
            print!("{rendered}");
        }
    }
    Ok(())
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ordinal_common::Error>() {
        Some(e) if e.is_config() => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
