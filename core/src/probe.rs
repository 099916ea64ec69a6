//! The probe engine.
//!
//! Five structurally different network operations behind one contract: a
//! [`Probe`] performs a single timed attempt against the run's target and
//! reports a [`ProbeResult`]. Faults are data here. A probe converts every
//! failure it can observe into an `error`-class status and never returns an
//! `Err` or panics on network conditions.
//!
//! The family is chosen once per run through [`Prober::new`], so the
//! orchestrator never branches on the mode itself.

use std::error::Error as StdError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use trafgen_common::{Mode, ProbeConfig, ProbeResult, Target};

use crate::error::RunError;

mod dns;
mod http;
mod icmp;
mod tcp;
mod udp;

pub use dns::DnsProbe;
pub use http::HttpProbe;
pub use icmp::IcmpProbe;
pub use tcp::TcpProbe;
pub use udp::UdpProbe;

/// One timed network operation against a fixed target.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Protocol tag written next to every sample.
    fn mode(&self) -> Mode;

    /// Performs one attempt. Blocks for at most the configured timeout
    /// (plus resolver time for hostnames).
    async fn probe(&self) -> ProbeResult;
}

/// The probe family selected for a run.
#[derive(Debug)]
pub enum Prober {
    Icmp(IcmpProbe),
    Http(HttpProbe),
    Dns(DnsProbe),
    Tcp(TcpProbe),
    Udp(UdpProbe),
}

impl Prober {
    /// Builds the probe for `cfg.mode`.
    ///
    /// # Errors
    /// Returns [`RunError::ProbeSetup`] when the family's client cannot be
    /// constructed (e.g. the HTTP client fails to initialize).
    pub fn new(target: &Target, cfg: &ProbeConfig) -> Result<Self, RunError> {
        let timeout = cfg.timeout();
        let prober = match cfg.mode {
            Mode::Icmp => Prober::Icmp(IcmpProbe::new(target.clone(), timeout)),
            Mode::Http => {
                let probe = HttpProbe::new(target, timeout).map_err(|e| RunError::ProbeSetup {
                    mode: Mode::Http.as_str(),
                    reason: describe(&e),
                })?;
                Prober::Http(probe)
            }
            Mode::Dns => Prober::Dns(DnsProbe::new(target.clone(), &cfg.dns, timeout)),
            Mode::Tcp => Prober::Tcp(TcpProbe::new(target, cfg.port, timeout)),
            Mode::Udp => Prober::Udp(UdpProbe::new(target.clone(), cfg.port, &cfg.udp, timeout)),
        };
        Ok(prober)
    }
}

#[async_trait]
impl Probe for Prober {
    fn mode(&self) -> Mode {
        match self {
            Prober::Icmp(p) => p.mode(),
            Prober::Http(p) => p.mode(),
            Prober::Dns(p) => p.mode(),
            Prober::Tcp(p) => p.mode(),
            Prober::Udp(p) => p.mode(),
        }
    }

    async fn probe(&self) -> ProbeResult {
        match self {
            Prober::Icmp(p) => p.probe().await,
            Prober::Http(p) => p.probe().await,
            Prober::Dns(p) => p.probe().await,
            Prober::Tcp(p) => p.probe().await,
            Prober::Udp(p) => p.probe().await,
        }
    }
}

/// Flattens an error and its sources into one line of diagnostic text.
pub(crate) fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// `host:port` with IPv6 literals bracketed.
pub(crate) fn authority(target: &Target, port: u16) -> String {
    match target.ip_literal() {
        Some(ip) => SocketAddr::new(ip, port).to_string(),
        None => format!("{}:{}", target.host(), port),
    }
}

/// Wildcard bind address in the same family as `dest`.
pub(crate) fn unspecified_for(dest: &SocketAddr) -> SocketAddr {
    let ip = match dest.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}
