mod commands;
mod terminal;

use std::process::ExitCode;

use commands::CommandLine;
use terminal::{logging, print};
use tracing::error;
use trafgen_common::config::ConfigError;
use trafgen_core::RunError;

#[tokio::main]
async fn main() -> ExitCode {
    let commands = CommandLine::parse_args();
    logging::init_logging(commands.verbose);

    match commands::run::run(commands).await {
        Ok(summary) => {
            print::summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            exit_code(&e)
        }
    }
}

/// 1: refused target, 2: bad configuration, 3: sample log failure.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    if err.downcast_ref::<ConfigError>().is_some() {
        return ExitCode::from(2);
    }
    match err.downcast_ref::<RunError>() {
        Some(RunError::UnsafeTarget { .. }) => ExitCode::from(1),
        Some(RunError::Config(_)) | Some(RunError::ProbeSetup { .. }) => ExitCode::from(2),
        Some(RunError::LogOpen { .. }) | Some(RunError::LogWrite { .. }) => ExitCode::from(3),
        None => ExitCode::FAILURE,
    }
}
