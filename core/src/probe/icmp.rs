//! ICMP echo probe.
//!
//! Sends a single echo request and waits for the matching reply. `lost` means
//! the request went out and nothing came back in time; `error` means the echo
//! could not be attempted at all.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tokio::time::timeout;
use tracing::debug;
use trafgen_common::network::target;
use trafgen_common::{Mode, ProbeResult, Target};

use super::Probe;

/// Echo payload length, matching the classic `ping` default.
const ECHO_PAYLOAD_LEN: usize = 56;

#[derive(Debug)]
pub struct IcmpProbe {
    target: Target,
    timeout: Duration,
}

impl IcmpProbe {
    pub fn new(target: Target, timeout: Duration) -> Self {
        Self { target, timeout }
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    fn mode(&self) -> Mode {
        Mode::Icmp
    }

    async fn probe(&self) -> ProbeResult {
        let ip_addr = match target::resolve(self.target.host()).await {
            Ok(ip) => ip,
            Err(e) => return ProbeResult::error(format!("cannot resolve {}: {e}", self.target)),
        };

        let client = match open_client(ip_addr) {
            Ok(client) => client,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return ProbeResult::unavailable(format!(
                    "ICMP socket not permitted ({e}); run with raw-socket privileges"
                ));
            }
            Err(e) => return ProbeResult::unavailable(format!("cannot open ICMP socket: {e}")),
        };

        let mut pinger = client.pinger(ip_addr, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        let payload = [0u8; ECHO_PAYLOAD_LEN];
        match timeout(self.timeout, pinger.ping(PingSequence(0), &payload)).await {
            Ok(Ok((_, rtt))) => ProbeResult::ok(rtt),
            Ok(Err(SurgeError::Timeout { .. })) | Err(_) => {
                debug!(target = %self.target, "echo reply not received in time");
                ProbeResult::lost()
            }
            Ok(Err(e)) => ProbeResult::error(e),
        }
    }
}

fn open_client(ip_addr: IpAddr) -> std::io::Result<Client> {
    match ip_addr {
        IpAddr::V4(_) => Client::new(&Config::default()),
        IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trafgen_common::{Scope, Status};

    #[tokio::test]
    async fn unresolvable_host_is_an_error() {
        let probe = IcmpProbe::new(
            Target::with_scope("does-not-exist.invalid", Scope::External),
            Duration::from_millis(200),
        );
        let result = probe.probe().await;
        assert_eq!(result.status, Status::Error);
        assert!(result.value.to_string().contains("cannot resolve"));
    }

    /// Outcome depends on ICMP socket permission in the test environment.
    #[tokio::test]
    async fn loopback_echo_is_never_lost() {
        let probe = IcmpProbe::new(
            Target::with_scope("127.0.0.1", Scope::Local),
            Duration::from_millis(500),
        );
        let result = probe.probe().await;
        match result.status {
            Status::Ok => assert!(result.latency_ms().unwrap() >= 0.0),
            Status::Unavailable | Status::Error => assert!(!result.value.to_string().is_empty()),
            other => panic!("unexpected status {other}"),
        }
    }
}
