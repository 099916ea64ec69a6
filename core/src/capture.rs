//! Live packet capture around a probing run.
//!
//! The [`CaptureController`] owns an external capture process (tcpdump by
//! default) for the length of one run:
//!
//! ```text
//! Idle ──start()──▶ Starting ──▶ Running ──stop()──▶ Stopping ──▶ Idle
//!                      │
//!                      └── tool missing / spawn failed ──▶ Idle (warning)
//! ```
//!
//! The process is started in its own process group so that the interrupt on
//! stop reaches every process the tool forks, which makes tcpdump flush and
//! close the pcap file. A process that ignores the interrupt is killed once the
//! grace period runs out. Nothing in this module can fail a run: every problem
//! is logged as a warning and the probing result stands on its own.

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use trafgen_common::utils::tool;

use crate::error::CaptureError;

pub const DEFAULT_CAPTURE_TOOL: &str = "tcpdump";
pub const DEFAULT_CAPTURE_FILTER: &str = "icmp or icmp6";

/// Time given to the tool to open its output before probing starts.
const SETTLE_DELAY: Duration = Duration::from_millis(300);
/// Time the tool gets to flush after the interrupt before it is killed.
const GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    pub interface: String,
    pub output: PathBuf,
    /// Filter expression handed to the tool verbatim.
    pub filter: String,
    pub tool: PathBuf,
    pub settle_delay: Duration,
    pub grace_period: Duration,
}

impl CaptureConfig {
    pub fn new(interface: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            interface: interface.into(),
            output: output.into(),
            filter: DEFAULT_CAPTURE_FILTER.to_string(),
            tool: PathBuf::from(DEFAULT_CAPTURE_TOOL),
            settle_delay: SETTLE_DELAY,
            grace_period: GRACE_PERIOD,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// tcpdump arguments: full snap length, packet-buffered writes.
    pub fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            self.interface.clone().into(),
            "-s".into(),
            "0".into(),
            "-U".into(),
            "-w".into(),
            self.output.clone().into(),
        ];
        if !self.filter.trim().is_empty() {
            args.push(self.filter.clone().into());
        }
        args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Sole owner of the capture process handle.
#[derive(Debug)]
pub struct CaptureController {
    config: CaptureConfig,
    child: Option<Child>,
    state: CaptureState,
}

impl CaptureController {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            child: None,
            state: CaptureState::Idle,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CaptureState::Running
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Launches the capture tool. Best-effort: on any failure the controller
    /// stays idle and the run proceeds without a capture.
    pub async fn start(&mut self) {
        self.start_until(std::future::pending()).await;
    }

    /// Like [`start`](Self::start), but the settle delay ends early when
    /// `cancel` completes. The process is kept either way so that `stop`
    /// can shut it down.
    pub async fn start_until<C>(&mut self, cancel: C)
    where
        C: Future<Output = ()>,
    {
        if self.state != CaptureState::Idle {
            warn!(state = ?self.state, "capture already started, ignoring start request");
            return;
        }

        self.state = CaptureState::Starting;
        match self.launch(cancel).await {
            Ok(child) => {
                info!(
                    pid = child.id(),
                    iface = %self.config.interface,
                    output = %self.config.output.display(),
                    "packet capture running"
                );
                self.child = Some(child);
                self.state = CaptureState::Running;
            }
            Err(e) => {
                warn!("{e}; continuing without packet capture");
                self.state = CaptureState::Idle;
            }
        }
    }

    /// Interrupts the capture process group, waits for it to flush, and kills
    /// it if the grace period runs out. No-op when nothing is running; safe to
    /// call repeatedly.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        self.state = CaptureState::Stopping;
        match terminate(&mut child, self.config.grace_period).await {
            Ok(status) => debug!(%status, "packet capture stopped"),
            Err(e) => warn!("capture did not stop cleanly: {e}"),
        }
        self.state = CaptureState::Idle;
    }

    async fn launch<C>(&self, cancel: C) -> Result<Child, CaptureError>
    where
        C: Future<Output = ()>,
    {
        let program = tool::find_program(&self.config.tool)
            .ok_or_else(|| CaptureError::ToolMissing(self.config.tool.display().to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(self.config.arguments());
        spawn_detached(cmd, self.config.settle_delay, cancel).await
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        let Some(child) = self.child.take() else {
            return;
        };
        if let Some(pid) = child.id() {
            warn!(pid, "capture still running at teardown, killing its process group");
            kill_group(pid);
        }
    }
}

/// Spawns `cmd` as the leader of a new process group with stdio detached,
/// then waits `settle` (or until `cancel`) and confirms it is still alive.
async fn spawn_detached<C>(
    mut cmd: Command,
    settle: Duration,
    cancel: C,
) -> Result<Child, CaptureError>
where
    C: Future<Output = ()>,
{
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(CaptureError::Spawn)?;

    tokio::select! {
        _ = sleep(settle) => {}
        _ = cancel => debug!(pid = child.id(), "settle delay cut short by shutdown"),
    }
    if let Some(status) = child.try_wait().map_err(CaptureError::Wait)? {
        return Err(CaptureError::EarlyExit(status));
    }
    Ok(child)
}

#[cfg(unix)]
async fn terminate(child: &mut Child, grace: Duration) -> Result<ExitStatus, CaptureError> {
    terminate_with(child, grace, libc::SIGINT).await
}

/// Sends `interrupt` to the group, then SIGKILL if the grace period runs out
/// or the interrupt could not be delivered.
#[cfg(unix)]
async fn terminate_with(
    child: &mut Child,
    grace: Duration,
    interrupt: libc::c_int,
) -> Result<ExitStatus, CaptureError> {
    let Some(pid) = child.id() else {
        return child.wait().await.map_err(CaptureError::Wait);
    };
    let pgid = pid as libc::pid_t;

    if let Err(e) = signal_group(pgid, interrupt) {
        warn!(pid, "{e}; killing capture process group");
        if signal_group(pgid, libc::SIGKILL).is_err() {
            child.start_kill().map_err(CaptureError::Wait)?;
        }
        return child.wait().await.map_err(CaptureError::Wait);
    }
    match timeout(grace, child.wait()).await {
        Ok(status) => status.map_err(CaptureError::Wait),
        Err(_) => {
            warn!(pid, grace_ms = grace.as_millis(), "capture ignored interrupt, killing it");
            signal_group(pgid, libc::SIGKILL)?;
            child.wait().await.map_err(CaptureError::Wait)
        }
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, grace: Duration) -> Result<ExitStatus, CaptureError> {
    child.start_kill().map_err(CaptureError::Wait)?;
    match timeout(grace, child.wait()).await {
        Ok(status) => status.map_err(CaptureError::Wait),
        Err(_) => child.wait().await.map_err(CaptureError::Wait),
    }
}

/// Sends `signal` to process group `pgid`. A group that is already gone is
/// not an error.
#[cfg(unix)]
fn signal_group(pgid: libc::pid_t, signal: libc::c_int) -> Result<(), CaptureError> {
    // SAFETY: killpg has no memory-safety preconditions.
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc == 0 {
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(CaptureError::Signal {
        pgid: pgid as i32,
        source: err,
    })
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    let _ = signal_group(pid as libc::pid_t, libc::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
