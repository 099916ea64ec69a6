//! # trafgen core
//!
//! * **[`probe`]**: the five probe families behind one [`probe::Probe`] contract.
//! * **[`capture`]**: tcpdump lifecycle around a run.
//! * **[`logger`]**: the CSV sample log.
//! * **[`session`]**: the orchestrator tying them together.

pub mod capture;
pub mod error;
pub mod logger;
pub mod probe;
pub mod session;

pub use capture::{CaptureConfig, CaptureController, CaptureState};
pub use error::{CaptureError, RunError};
pub use logger::SampleLogger;
pub use probe::{Probe, Prober};
pub use session::{CaptureSettings, RunConfig, RunSummary, run};
