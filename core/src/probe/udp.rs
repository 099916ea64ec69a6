//! UDP datagram probe.
//!
//! Without reply-wait the probe only proves the datagram left the host
//! (`sent`). With reply-wait any datagram arriving on the same socket before
//! the timeout counts as `ok-reply`; silence is `no-reply`. The socket lives
//! for one call and is closed on every path by going out of scope.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use trafgen_common::config::UdpOptions;
use trafgen_common::network::target;
use trafgen_common::{Mode, ProbeResult, Target};
use trafgen_protocols::udp;

use super::{Probe, unspecified_for};

const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug)]
pub struct UdpProbe {
    target: Target,
    port: u16,
    payload: Vec<u8>,
    await_reply: bool,
    timeout: Duration,
}

impl UdpProbe {
    pub fn new(target: Target, port: u16, opts: &UdpOptions, timeout: Duration) -> Self {
        Self {
            target,
            port,
            payload: udp::create_payload(opts.payload_size),
            await_reply: opts.await_reply,
            timeout,
        }
    }

    async fn exchange(&self) -> std::io::Result<ProbeResult> {
        let ip_addr = target::resolve(self.target.host()).await?;
        let dest = SocketAddr::new(ip_addr, self.port);
        let socket = UdpSocket::bind(unspecified_for(&dest)).await?;

        let start = Instant::now();
        socket.send_to(&self.payload, dest).await?;
        if !self.await_reply {
            return Ok(ProbeResult::sent());
        }

        let mut buf = vec![0u8; MAX_DATAGRAM];
        match timeout(self.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok(_)) => Ok(ProbeResult::ok_reply(start.elapsed())),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(ProbeResult::no_reply()),
        }
    }
}

#[async_trait]
impl Probe for UdpProbe {
    fn mode(&self) -> Mode {
        Mode::Udp
    }

    async fn probe(&self) -> ProbeResult {
        self.exchange().await.unwrap_or_else(ProbeResult::error)
    }
}
