//! DNS resolution probe.
//!
//! With the native backend the strategy depends on the *target*, not on the
//! query name:
//! * target is an IP literal or classified local: send an A query for the
//!   configured name straight to `target:dns_port`.
//! * otherwise: resolve the configured name through the system resolver.
//!
//! The `nslookup` backend shells out to the lookup utility instead and maps
//! its exit status onto the same `ok`/`error` pair.

use std::net::SocketAddr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use trafgen_common::config::{DnsBackend, DnsOptions};
use trafgen_common::network::target;
use trafgen_common::utils::tool;
use trafgen_common::{Mode, ProbeResult, Target};
use trafgen_protocols::dns::{self, DnsReply};

use super::{Probe, describe, unspecified_for};

const NSLOOKUP: &str = "nslookup";
/// `nslookup` gets at least this long regardless of the probe timeout.
const MIN_NSLOOKUP_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_DNS_DATAGRAM: usize = 4096;

#[derive(Debug)]
pub struct DnsProbe {
    target: Target,
    query_name: String,
    port: u16,
    backend: DnsBackend,
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(target: Target, opts: &DnsOptions, timeout: Duration) -> Self {
        Self {
            target,
            query_name: opts.query_name.clone(),
            port: opts.port,
            backend: opts.backend,
            timeout,
        }
    }

    fn queries_target_directly(&self) -> bool {
        self.target.is_local() || self.target.ip_literal().is_some()
    }

    async fn direct_query(&self) -> ProbeResult {
        let start = Instant::now();
        match timeout(self.timeout, self.exchange()).await {
            Ok(Ok(reply)) => {
                let elapsed = start.elapsed();
                debug!(
                    server = %self.target,
                    rcode = %reply.rcode,
                    answers = reply.answers,
                    "dns reply received"
                );
                ProbeResult::ok(elapsed)
            }
            Ok(Err(e)) => ProbeResult::error(format!("{e:#}")),
            Err(_) => ProbeResult::error(format!(
                "dns query to {} timed out after {}ms",
                self.target,
                self.timeout.as_millis()
            )),
        }
    }

    /// Sends one query and waits for the reply carrying the same id.
    async fn exchange(&self) -> anyhow::Result<DnsReply> {
        let server_ip = target::resolve(self.target.host())
            .await
            .with_context(|| format!("cannot resolve resolver {}", self.target))?;
        let server = SocketAddr::new(server_ip, self.port);

        let socket = UdpSocket::bind(unspecified_for(&server)).await?;
        socket.connect(server).await?;

        let id: u16 = rand::random();
        let query = dns::create_query_packet(&self.query_name, id)?;
        socket.send(&query).await?;

        let mut buf = vec![0u8; MAX_DNS_DATAGRAM];
        loop {
            let len = socket.recv(&mut buf).await?;
            match dns::parse_reply(&buf[..len]) {
                Ok(reply) if reply.id == id && reply.is_response => return Ok(reply),
                Ok(reply) => debug!(id = reply.id, "ignoring unrelated dns datagram"),
                Err(e) => debug!(error = %e, "ignoring malformed dns datagram"),
            }
        }
    }

    async fn system_lookup(&self) -> ProbeResult {
        let start = Instant::now();
        let lookup = tokio::net::lookup_host((self.query_name.as_str(), 0));
        match timeout(self.timeout, lookup).await {
            Ok(Ok(mut addrs)) => {
                let elapsed = start.elapsed();
                if addrs.next().is_some() {
                    ProbeResult::ok(elapsed)
                } else {
                    ProbeResult::error(format!("no addresses found for {}", self.query_name))
                }
            }
            Ok(Err(e)) => ProbeResult::error(describe(&e)),
            Err(_) => ProbeResult::error(format!(
                "lookup of {} timed out after {}ms",
                self.query_name,
                self.timeout.as_millis()
            )),
        }
    }

    async fn nslookup(&self) -> ProbeResult {
        let Some(program) = tool::find_program(NSLOOKUP) else {
            return ProbeResult::unavailable(format!("{NSLOOKUP} not found"));
        };

        let limit = self.timeout.max(MIN_NSLOOKUP_TIMEOUT);
        let mut cmd = Command::new(program);
        cmd.arg(&self.query_name)
            .arg(self.target.host())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let start = Instant::now();
        match timeout(limit, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => ProbeResult::ok(start.elapsed()),
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let text = if stderr.trim().is_empty() { stdout } else { stderr };
                ProbeResult::error(text.trim())
            }
            Ok(Err(e)) => ProbeResult::error(format!("failed to run {NSLOOKUP}: {e}")),
            Err(_) => ProbeResult::error(format!(
                "{NSLOOKUP} timed out after {}ms",
                limit.as_millis()
            )),
        }
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn mode(&self) -> Mode {
        Mode::Dns
    }

    async fn probe(&self) -> ProbeResult {
        match self.backend {
            DnsBackend::Native if self.queries_target_directly() => self.direct_query().await,
            DnsBackend::Native => self.system_lookup().await,
            DnsBackend::Nslookup => self.nslookup().await,
        }
    }
}
