//! # Probe Outcomes
//!
//! Every probe family reports through the same two types: a [`Status`] tag and
//! an optional [`Value`]. A [`SampleRecord`] stamps one outcome with its
//! sequence number and wall-clock time for the sample log.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Mode;

/// Outcome tag of a single probe.
///
/// The set a probe may return is closed per family:
///
/// | Family | Statuses |
/// |--------|----------|
/// | ICMP   | `ok`, `lost`, `error` |
/// | HTTP   | `ok`, `error` |
/// | DNS    | `ok`, `error` |
/// | TCP    | `ok`, `error` |
/// | UDP    | `sent`, `ok-reply`, `no-reply`, `error` |
///
/// `exception` is reserved for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Lost,
    Sent,
    OkReply,
    NoReply,
    Error,
    /// The probe could not be attempted because a runtime capability
    /// (raw sockets, a lookup utility) is missing. Logged as `error`.
    Unavailable,
    Exception,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Lost => "lost",
            Status::Sent => "sent",
            Status::OkReply => "ok-reply",
            Status::NoReply => "no-reply",
            Status::Error | Status::Unavailable => "error",
            Status::Exception => "exception",
        }
    }

    /// Whether the status carries a measured latency.
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Ok | Status::OkReply)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `latency_ms_or_info` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    LatencyMs(f64),
    Info(String),
    Empty,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::LatencyMs(ms) => write!(f, "{ms:.3}"),
            Value::Info(text) => f.write_str(text),
            Value::Empty => Ok(()),
        }
    }
}

/// Result of one probe call. Constructors keep the latency/status pairing
/// consistent: only success statuses carry a latency.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub status: Status,
    pub value: Value,
}

impl ProbeResult {
    pub fn ok(elapsed: Duration) -> Self {
        Self {
            status: Status::Ok,
            value: Value::LatencyMs(to_millis(elapsed)),
        }
    }

    pub fn ok_reply(elapsed: Duration) -> Self {
        Self {
            status: Status::OkReply,
            value: Value::LatencyMs(to_millis(elapsed)),
        }
    }

    pub fn sent() -> Self {
        Self {
            status: Status::Sent,
            value: Value::Empty,
        }
    }

    pub fn lost() -> Self {
        Self {
            status: Status::Lost,
            value: Value::Empty,
        }
    }

    pub fn no_reply() -> Self {
        Self {
            status: Status::NoReply,
            value: Value::Empty,
        }
    }

    pub fn error(reason: impl fmt::Display) -> Self {
        Self {
            status: Status::Error,
            value: Value::Info(reason.to_string()),
        }
    }

    pub fn unavailable(reason: impl fmt::Display) -> Self {
        Self {
            status: Status::Unavailable,
            value: Value::Info(reason.to_string()),
        }
    }

    pub fn exception(reason: impl fmt::Display) -> Self {
        Self {
            status: Status::Exception,
            value: Value::Info(reason.to_string()),
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self.value {
            Value::LatencyMs(ms) => Some(ms),
            _ => None,
        }
    }
}

/// One row of the sample log.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub seq: u64,
    pub mode: Mode,
    pub result: ProbeResult,
}

impl SampleRecord {
    pub fn new(seq: u64, mode: Mode, result: ProbeResult) -> Self {
        Self {
            timestamp: epoch_seconds(),
            seq,
            mode,
            result,
        }
    }
}

pub fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn to_millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}
