use std::path::PathBuf;

use thiserror::Error;
use trafgen_common::config::ConfigError;

/// Failures that end a run before or while the sample log is written.
///
/// Probe faults are never represented here: they are recorded as rows.
#[derive(Debug, Error)]
pub enum RunError {
    /// The safety gate rejected the target and no override was given.
    #[error("Refusing external address {target}")]
    UnsafeTarget { target: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to set up {mode} probe: {reason}")]
    ProbeSetup { mode: &'static str, reason: String },

    #[error("cannot open sample log {}: {source}", path.display())]
    LogOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write sample log {}: {source}", path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capture subsystem failures. Always reported as warnings, never returned
/// from a run.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture tool '{0}' not found")]
    ToolMissing(String),

    #[error("failed to start capture tool: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("capture tool exited during startup with {0}")]
    EarlyExit(std::process::ExitStatus),

    #[error("failed to signal capture process group {pgid}: {source}")]
    Signal {
        pgid: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to reap capture process: {0}")]
    Wait(#[source] std::io::Error),
}
