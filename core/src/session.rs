//! # Run Orchestration
//!
//! A run is: safety gate → capture start → open log → N serial samples →
//! capture stop. The gate and the log open are the only fatal steps; every
//! sample produces exactly one row whatever the probe does, and capture stop
//! runs on every exit path once capture was started.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use trafgen_common::config::ConfigError;
use trafgen_common::network::interface;
use trafgen_common::{ProbeConfig, ProbeResult, SampleRecord, Scope, Status, Target};

use crate::capture::{CaptureConfig, CaptureController, DEFAULT_CAPTURE_FILTER, DEFAULT_CAPTURE_TOOL};
use crate::error::RunError;
use crate::logger::SampleLogger;
use crate::probe::{Probe, Prober};

pub const DEFAULT_TARGET: &str = "127.0.0.1";
pub const DEFAULT_SAMPLES: u64 = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_OUTPUT: &str = "csv_files/traffic_log.csv";

/// Capture options as given by the user. The interface is filled in from the
/// target's scope when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub output: PathBuf,
    pub interface: Option<String>,
    pub filter: String,
    pub tool: PathBuf,
}

impl CaptureSettings {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            interface: None,
            filter: DEFAULT_CAPTURE_FILTER.to_string(),
            tool: PathBuf::from(DEFAULT_CAPTURE_TOOL),
        }
    }

    pub fn with_interface(mut self, interface: Option<String>) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.tool = tool.into();
        self
    }

    fn resolve(&self, scope: Scope) -> CaptureConfig {
        let interface = self
            .interface
            .clone()
            .unwrap_or_else(|| interface::default_capture_interface(scope));
        CaptureConfig::new(interface, self.output.clone())
            .with_filter(self.filter.clone())
            .with_tool(self.tool.clone())
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: String,
    /// Skips the safety gate.
    pub allow_external: bool,
    pub samples: u64,
    pub interval: Duration,
    pub output: PathBuf,
    pub probe: ProbeConfig,
    pub capture: Option<CaptureSettings>,
}

impl RunConfig {
    pub fn new(target: impl Into<String>, probe: ProbeConfig) -> Self {
        Self {
            target: target.into(),
            allow_external: false,
            samples: DEFAULT_SAMPLES,
            interval: DEFAULT_INTERVAL,
            output: PathBuf::from(DEFAULT_OUTPUT),
            probe,
            capture: None,
        }
    }

    pub fn with_allow_external(mut self, allow: bool) -> Self {
        self.allow_external = allow;
        self
    }

    pub fn with_samples(mut self, samples: u64) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_capture(mut self, capture: Option<CaptureSettings>) -> Self {
        self.capture = capture;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples == 0 {
            return Err(ConfigError::NoSamples);
        }
        self.probe.validate()
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub target: Target,
    pub rows: u64,
    pub counts: BTreeMap<Status, u64>,
    pub output: PathBuf,
    /// Set only when the capture tool was actually running.
    pub pcap: Option<PathBuf>,
    /// The loop ended early on Ctrl+C or SIGTERM.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn count(&self, status: Status) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

/// Executes a run, ending the loop early on Ctrl+C or SIGTERM.
///
/// # Errors
/// Fails before any sample on an unsafe target, invalid configuration, probe
/// setup failure or an unopenable log; fails mid-run only if a row cannot be
/// written. Capture problems are never errors.
pub async fn run(cfg: RunConfig) -> Result<RunSummary, RunError> {
    run_until(cfg, shutdown_signal()).await
}

/// Like [`run`], but the loop ends early when `shutdown` completes.
pub async fn run_until<F>(cfg: RunConfig, shutdown: F) -> Result<RunSummary, RunError>
where
    F: Future<Output = ()> + Send + 'static,
{
    cfg.validate()?;

    let target = Target::classify(cfg.target.as_str()).await;
    if !target.is_local() {
        if !cfg.allow_external {
            return Err(RunError::UnsafeTarget {
                target: cfg.target.clone(),
            });
        }
        warn!(target = %target, "safety gate overridden, probing external target");
    }

    let prober = Arc::new(Prober::new(&target, &cfg.probe)?);
    info!(
        target = %target,
        mode = %cfg.probe.mode,
        samples = cfg.samples,
        interval_ms = cfg.interval.as_millis(),
        "starting run"
    );

    // The listener exists before the capture tool does, so an interrupt at
    // any later point reaches the stop path below.
    let (stop_tx, stop_rx) = watch::channel(false);
    let listener = tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let mut capture = cfg
        .capture
        .as_ref()
        .map(|settings| CaptureController::new(settings.resolve(target.scope())));
    if let Some(controller) = capture.as_mut() {
        controller.start_until(stopped(stop_rx.clone())).await;
    }
    let capturing = capture.as_ref().is_some_and(CaptureController::is_running);

    let outcome = match SampleLogger::create(&cfg.output) {
        Ok(logger) => sample_loop(prober, logger, cfg.samples, cfg.interval, stop_rx).await,
        Err(e) => Err(e),
    };

    listener.abort();
    if let Some(controller) = capture.as_mut() {
        controller.stop().await;
    }

    let tally = outcome?;
    Ok(RunSummary {
        target,
        rows: tally.rows,
        counts: tally.counts,
        output: cfg.output,
        pcap: cfg
            .capture
            .filter(|_| capturing)
            .map(|settings| settings.output),
        interrupted: tally.interrupted,
    })
}

#[derive(Debug, Default)]
struct Tally {
    rows: u64,
    counts: BTreeMap<Status, u64>,
    interrupted: bool,
}

async fn sample_loop<P>(
    probe: Arc<P>,
    mut logger: SampleLogger,
    samples: u64,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<Tally, RunError>
where
    P: Probe + 'static,
{
    let mode = probe.mode();
    let mut tally = Tally::default();

    for seq in 0..samples {
        if *stop.borrow() {
            tally.interrupted = true;
            break;
        }

        let result = sample_once(&probe).await;
        debug!(seq, status = %result.status, value = %result.value, "sample");
        *tally.counts.entry(result.status).or_default() += 1;
        logger.append(&SampleRecord::new(seq, mode, result))?;
        tally.rows += 1;

        if seq + 1 < samples && !interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.changed() => {}
            }
        }
    }

    if *stop.borrow() && tally.rows < samples {
        tally.interrupted = true;
        info!(rows = tally.rows, "run interrupted");
    }
    Ok(tally)
}

/// Runs one probe on its own task so a panic becomes an `exception` row
/// instead of ending the loop.
async fn sample_once<P>(probe: &Arc<P>) -> ProbeResult
where
    P: Probe + 'static,
{
    let probe = Arc::clone(probe);
    match tokio::spawn(async move { probe.probe().await }).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => ProbeResult::exception(panic_message(e.into_panic())),
        Err(e) => ProbeResult::exception(e),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "probe panicked".to_string()
    }
}

/// Resolves once a stop has been requested. A closed channel never resolves.
async fn stopped(mut stop: watch::Receiver<bool>) {
    if stop.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Installs the Ctrl+C and SIGTERM handlers on call, before the returned
/// future is first polled. The future completes on the first of them.
#[cfg(unix)]
fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    use tokio::signal::unix::{SignalKind, signal};

    let install = |kind: SignalKind, name: &'static str| match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("failed to install {name} handler: {e}");
            None
        }
    };
    let mut sigint = install(SignalKind::interrupt(), "Ctrl+C");
    let mut sigterm = install(SignalKind::terminate(), "SIGTERM");

    async move {
        let ctrl_c = async {
            match sigint.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };
        let terminate = async {
            match sigterm.as_mut() {
                Some(stream) => {
                    stream.recv().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = ctrl_c => info!("received Ctrl+C, finishing current sample"),
            _ = terminate => info!("received terminate signal, finishing current sample"),
        }
    }
}

#[cfg(not(unix))]
fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, finishing current sample");
    }
}
