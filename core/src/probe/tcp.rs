//! TCP connect probe: open, time, close.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use trafgen_common::{Mode, ProbeResult, Target};

use super::{Probe, authority};

#[derive(Debug)]
pub struct TcpProbe {
    authority: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(target: &Target, port: u16, timeout: Duration) -> Self {
        Self {
            authority: authority(target, port),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn mode(&self) -> Mode {
        Mode::Tcp
    }

    async fn probe(&self) -> ProbeResult {
        let start = Instant::now();
        match timeout(self.timeout, TcpStream::connect(self.authority.as_str())).await {
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                drop(stream);
                ProbeResult::ok(elapsed)
            }
            Ok(Err(e)) => ProbeResult::error(e),
            Err(_) => ProbeResult::error(format!(
                "connect to {} timed out after {}ms",
                self.authority,
                self.timeout.as_millis()
            )),
        }
    }
}
