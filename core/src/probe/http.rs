//! HTTP reachability probe: one `HEAD` request, redirects followed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use trafgen_common::{Mode, ProbeResult, Target};

use super::{Probe, describe};

const MAX_REDIRECTS: usize = 10;

pub struct HttpProbe {
    url: String,
    client: Client,
}

impl HttpProbe {
    /// # Errors
    /// Fails if the HTTP client cannot be built (TLS backend initialization).
    pub fn new(target: &Target, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .no_proxy()
            .build()?;

        Ok(Self {
            url: target_url(target),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn mode(&self) -> Mode {
        Mode::Http
    }

    async fn probe(&self) -> ProbeResult {
        let start = Instant::now();
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                let elapsed = start.elapsed();
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    ProbeResult::ok(elapsed)
                } else {
                    ProbeResult::error(format!("HTTP {}", status.as_u16()))
                }
            }
            Err(e) => ProbeResult::error(describe(&e)),
        }
    }
}

/// Uses the target as a URL when it already carries a scheme.
fn target_url(target: &Target) -> String {
    let host = target.host();
    if host.starts_with("http://") || host.starts_with("https://") {
        return host.to_string();
    }
    match target.ip_literal() {
        Some(std::net::IpAddr::V6(v6)) => format!("http://[{v6}]"),
        _ => format!("http://{host}"),
    }
}
