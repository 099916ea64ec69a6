use tracing::info;
use trafgen_core::{RunSummary, session};

use super::CommandLine;

/// Runs the sampling session described by the command line.
pub async fn run(commands: CommandLine) -> anyhow::Result<RunSummary> {
    let cfg = commands.into_run_config()?;
    info!(
        mode = %cfg.probe.mode,
        target = %cfg.target,
        output = %cfg.output.display(),
        "configuration loaded"
    );

    Ok(session::run(cfg).await?)
}
