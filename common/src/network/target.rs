//! # Probe Target & Safety Gate
//!
//! A [`Target`] is the host a run probes, classified once as local or
//! external. Classification is fail-closed: a name that cannot be resolved is
//! treated as external.
//!
//! Local means loopback or a private range:
//! * IPv4: `127/8`, `10/8`, `172.16/12`, `192.168/16`, `169.254/16`, `0.0.0.0`.
//! * IPv6: `::1`, `fc00::/7`, `fe80::/10`, `::`, and IPv4-mapped forms of the above.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::debug;

/// Names accepted as local without resolving.
const TRIVIALLY_LOCAL: [&str; 3] = ["localhost", "::1", "127.0.0.1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    External,
}

/// A host to probe together with its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    host: String,
    scope: Scope,
}

impl Target {
    /// Resolves `host` and classifies it.
    pub async fn classify(host: impl Into<String>) -> Self {
        let host = host.into();
        let scope = if is_local(&host).await {
            Scope::Local
        } else {
            Scope::External
        };
        Self { host, scope }
    }

    /// Builds a target with a known scope.
    pub fn with_scope(host: impl Into<String>, scope: Scope) -> Self {
        Self {
            host: host.into(),
            scope,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_local(&self) -> bool {
        self.scope == Scope::Local
    }

    /// The host parsed as an address, if it is an IP literal.
    pub fn ip_literal(&self) -> Option<IpAddr> {
        parse_ip_literal(&self.host)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// Returns true iff `host` resolves exclusively to loopback/private addresses.
///
/// Every resolved address must be local; one public address is enough to
/// reject the host. Resolution failure returns false.
pub async fn is_local(host: &str) -> bool {
    if TRIVIALLY_LOCAL.contains(&host.to_ascii_lowercase().as_str()) {
        return true;
    }

    if let Some(ip) = parse_ip_literal(host) {
        return is_local_addr(&ip);
    }

    match resolve_all(host).await {
        Ok(addrs) if !addrs.is_empty() => addrs.iter().all(is_local_addr),
        Ok(_) => {
            debug!(host, "resolver returned no addresses");
            false
        }
        Err(e) => {
            debug!(host, error = %e, "could not resolve target");
            false
        }
    }
}

/// Resolves `host` to its first address, preferring IPv4.
pub async fn resolve(host: &str) -> std::io::Result<IpAddr> {
    if let Some(ip) = parse_ip_literal(host) {
        return Ok(ip);
    }

    let addrs = resolve_all(host).await?;
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no addresses found for {host}"),
            )
        })
}

async fn resolve_all(host: &str) -> std::io::Result<Vec<IpAddr>> {
    let addrs = tokio::net::lookup_host((host, 0)).await?;
    Ok(addrs.map(|addr| addr.ip()).collect())
}

/// Accepts plain and bracketed (`[::1]`) IP literals.
pub fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    trimmed.parse::<IpAddr>().ok()
}

pub fn is_local_addr(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_local_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_local_v4(&v4),
            None => is_local_v6(v6),
        },
    }
}

fn is_local_v4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_local_v6(ip: &Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unique_local() || ip.is_unicast_link_local() || ip.is_unspecified()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
