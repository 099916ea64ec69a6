//! Shared model for trafgen: probe configuration, probe outcomes, the probe
//! target with its safety classification, and small system helpers.

pub mod config;
pub mod sample;

pub mod network {
    pub mod interface;
    pub mod target;
}

pub mod utils {
    pub mod tool;
}

pub use config::{DnsBackend, Mode, ProbeConfig};
pub use network::target::{Scope, Target};
pub use sample::{ProbeResult, SampleRecord, Status, Value};
