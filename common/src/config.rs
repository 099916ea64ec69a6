//! # Probe Configuration
//!
//! Read-only settings shared by every probe family. A [`ProbeConfig`] is built
//! once from the command line and handed to the probe engine; nothing mutates
//! it afterwards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_UDP_PAYLOAD_SIZE: usize = 128;
pub const DEFAULT_DNS_NAME: &str = "example.com";
pub const DEFAULT_DNS_PORT: u16 = 53;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown mode '{0}', expected one of: icmp, http, dns, tcp, udp")]
    UnknownMode(String),

    #[error("unknown dns backend '{0}', expected 'native' or 'nslookup'")]
    UnknownDnsBackend(String),

    #[error("sample count must be at least 1")]
    NoSamples,

    #[error("interval must be a finite, non-negative number of seconds (got {0})")]
    InvalidInterval(String),

    #[error("dns query name cannot be empty")]
    EmptyQueryName,
}

/// Protocol family a run probes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Icmp,
    Http,
    Dns,
    Tcp,
    Udp,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Icmp, Mode::Http, Mode::Dns, Mode::Tcp, Mode::Udp];

    /// Tag written to the `mode` column of the sample log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Icmp => "icmp",
            Mode::Http => "http",
            Mode::Dns => "dns",
            Mode::Tcp => "tcp",
            Mode::Udp => "udp",
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icmp" => Ok(Mode::Icmp),
            "http" => Ok(Mode::Http),
            "dns" => Ok(Mode::Dns),
            "tcp" => Ok(Mode::Tcp),
            "udp" => Ok(Mode::Udp),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the DNS probe talks to a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DnsBackend {
    /// Built-in client: direct UDP query or the system resolver.
    #[default]
    Native,
    /// Shell out to the `nslookup` utility.
    Nslookup,
}

impl FromStr for DnsBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(DnsBackend::Native),
            "nslookup" => Ok(DnsBackend::Nslookup),
            _ => Err(ConfigError::UnknownDnsBackend(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpOptions {
    /// Datagram size in bytes, never below 1.
    pub payload_size: usize,
    /// Wait for any inbound datagram after sending.
    pub await_reply: bool,
}

impl Default for UdpOptions {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
            await_reply: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsOptions {
    pub query_name: String,
    pub port: u16,
    pub backend: DnsBackend,
}

impl Default for DnsOptions {
    fn default() -> Self {
        Self {
            query_name: DEFAULT_DNS_NAME.to_string(),
            port: DEFAULT_DNS_PORT,
            backend: DnsBackend::default(),
        }
    }
}

/// Settings for a single probe family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub mode: Mode,
    pub timeout_ms: u64,
    /// TCP/UDP destination port.
    pub port: u16,
    pub udp: UdpOptions,
    pub dns: DnsOptions,
}

impl ProbeConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            port: DEFAULT_PORT,
            udp: UdpOptions::default(),
            dns: DnsOptions::default(),
        }
    }

    /// Probe timeout as a [`Duration`]; probes never see raw milliseconds.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the UDP payload size, clamped to at least one byte.
    pub fn with_udp_payload_size(mut self, size: usize) -> Self {
        self.udp.payload_size = size.max(1);
        self
    }

    pub fn with_udp_await_reply(mut self, await_reply: bool) -> Self {
        self.udp.await_reply = await_reply;
        self
    }

    pub fn with_dns_name(mut self, name: impl Into<String>) -> Self {
        self.dns.query_name = name.into();
        self
    }

    pub fn with_dns_port(mut self, port: u16) -> Self {
        self.dns.port = port;
        self
    }

    pub fn with_dns_backend(mut self, backend: DnsBackend) -> Self {
        self.dns.backend = backend;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == Mode::Dns && self.dns.query_name.trim().is_empty() {
            return Err(ConfigError::EmptyQueryName);
        }
        Ok(())
    }
}

/// Parses the sampling interval given in (possibly fractional) seconds.
pub fn interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidInterval(secs.to_string()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing_is_case_insensitive() {
        assert_eq!(Mode::from_str("ICMP"), Ok(Mode::Icmp));
        assert_eq!(Mode::from_str("udp"), Ok(Mode::Udp));
        assert!(matches!(
            Mode::from_str("sctp"),
            Err(ConfigError::UnknownMode(_))
        ));
    }

    #[test]
    fn mode_tag_matches_parse_input() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_str(mode.as_str()), Ok(mode));
        }
    }

    #[test]
    fn defaults_follow_command_line_contract() {
        let cfg = ProbeConfig::new(Mode::Tcp);
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.timeout(), Duration::from_secs(1));
        assert_eq!(cfg.udp.payload_size, 128);
        assert!(!cfg.udp.await_reply);
        assert_eq!(cfg.dns.query_name, "example.com");
        assert_eq!(cfg.dns.port, 53);
        assert_eq!(cfg.dns.backend, DnsBackend::Native);
    }

    #[test]
    fn udp_payload_size_is_clamped() {
        let cfg = ProbeConfig::new(Mode::Udp).with_udp_payload_size(0);
        assert_eq!(cfg.udp.payload_size, 1);
    }

    #[test]
    fn timeout_is_converted_from_millis() {
        let cfg = ProbeConfig::new(Mode::Icmp).with_timeout_ms(250);
        assert_eq!(cfg.timeout().as_secs_f64(), 0.25);
    }

    #[test]
    fn empty_dns_name_is_rejected() {
        let cfg = ProbeConfig::new(Mode::Dns).with_dns_name("  ");
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyQueryName));
    }

    #[test]
    fn interval_rejects_negative_and_nan() {
        assert_eq!(interval_from_secs(0.0), Ok(Duration::ZERO));
        assert_eq!(interval_from_secs(1.5), Ok(Duration::from_millis(1500)));
        assert!(interval_from_secs(-1.0).is_err());
        assert!(interval_from_secs(f64::NAN).is_err());
    }
}
