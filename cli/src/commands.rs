pub mod run;

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use trafgen_common::config::{
    self, ConfigError, DEFAULT_DNS_NAME, DEFAULT_DNS_PORT, DEFAULT_PORT, DEFAULT_TIMEOUT_MS,
    DEFAULT_UDP_PAYLOAD_SIZE,
};
use trafgen_common::{DnsBackend, Mode, ProbeConfig};
use trafgen_core::capture::{DEFAULT_CAPTURE_FILTER, DEFAULT_CAPTURE_TOOL};
use trafgen_core::session::{DEFAULT_OUTPUT, DEFAULT_SAMPLES, DEFAULT_TARGET};
use trafgen_core::{CaptureSettings, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "trafgen", version)]
#[command(about = "Generates probe traffic against a target and logs every sample.")]
pub struct CommandLine {
    /// Probe family: icmp, http, dns, tcp or udp
    #[arg(long)]
    pub mode: Mode,

    /// Host or IP address to probe
    #[arg(long, env = "TRAFGEN_TARGET", default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Destination port for tcp and udp probes
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of samples to take
    #[arg(long, default_value_t = DEFAULT_SAMPLES)]
    pub samples: u64,

    /// Seconds to wait between samples
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub interval: f64,

    /// Per-probe timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// CSV sample log
    #[arg(long, env = "TRAFGEN_OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Probe targets outside loopback and private ranges
    #[arg(long)]
    pub allow_external: bool,

    #[arg(long, default_value_t = DEFAULT_UDP_PAYLOAD_SIZE)]
    pub udp_payload_size: usize,

    /// Wait for a reply datagram after each udp send
    #[arg(long)]
    pub udp_await_reply: bool,

    /// Name to resolve in dns mode
    #[arg(long, default_value = DEFAULT_DNS_NAME)]
    pub dns_name: String,

    /// Resolver port for direct dns queries
    #[arg(long, default_value_t = DEFAULT_DNS_PORT)]
    pub dns_port: u16,

    /// How dns lookups are performed: native or nslookup
    #[arg(long, default_value = "native")]
    pub dns_backend: DnsBackend,

    /// Record a packet capture of the run to this file
    #[arg(long)]
    pub pcap_out: Option<PathBuf>,

    /// Capture interface (default: loopback for local targets)
    #[arg(long, env = "TRAFGEN_IFACE")]
    pub iface: Option<String>,

    #[arg(long, default_value = DEFAULT_CAPTURE_FILTER)]
    pub capture_filter: String,

    #[arg(long, env = "TRAFGEN_CAPTURE_TOOL", default_value = DEFAULT_CAPTURE_TOOL)]
    pub capture_tool: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Turns the parsed flags into a run description.
    pub fn into_run_config(self) -> Result<RunConfig, ConfigError> {
        let interval = config::interval_from_secs(self.interval)?;

        let probe = ProbeConfig::new(self.mode)
            .with_timeout_ms(self.timeout)
            .with_port(self.port)
            .with_udp_payload_size(self.udp_payload_size)
            .with_udp_await_reply(self.udp_await_reply)
            .with_dns_name(self.dns_name)
            .with_dns_port(self.dns_port)
            .with_dns_backend(self.dns_backend);
        probe.validate()?;

        let capture = self.pcap_out.map(|pcap| {
            CaptureSettings::new(pcap)
                .with_interface(self.iface)
                .with_filter(self.capture_filter)
                .with_tool(self.capture_tool)
        });

        Ok(RunConfig::new(self.target, probe)
            .with_allow_external(self.allow_external)
            .with_samples(self.samples)
            .with_interval(interval)
            .with_output(self.output)
            .with_capture(capture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> CommandLine {
        let mut argv = vec!["trafgen"];
        argv.extend_from_slice(args);
        CommandLine::try_parse_from(argv).unwrap()
    }

    #[test]
    fn mode_is_required() {
        assert!(CommandLine::try_parse_from(["trafgen"]).is_err());
        assert!(CommandLine::try_parse_from(["trafgen", "--mode", "smtp"]).is_err());
    }

    #[test]
    fn defaults_describe_a_local_run() {
        let cfg = parse(&["--mode", "icmp"]).into_run_config().unwrap();

        assert_eq!(cfg.probe.mode, Mode::Icmp);
        assert_eq!(cfg.probe.port, 9999);
        assert_eq!(cfg.probe.timeout_ms, 1000);
        assert_eq!(cfg.probe.udp.payload_size, 128);
        assert!(!cfg.probe.udp.await_reply);
        assert_eq!(cfg.probe.dns.query_name, "example.com");
        assert_eq!(cfg.samples, 10);
        assert_eq!(cfg.interval, Duration::from_secs(1));
        assert!(!cfg.allow_external);
        assert!(cfg.capture.is_none());
    }

    #[test]
    fn capture_flags_only_apply_with_pcap_out() {
        let cfg = parse(&[
            "--mode",
            "udp",
            "--pcap-out",
            "run.pcap",
            "--iface",
            "eth1",
            "--capture-filter",
            "udp port 9999",
        ])
        .into_run_config()
        .unwrap();

        let capture = cfg.capture.unwrap();
        assert_eq!(capture.output, PathBuf::from("run.pcap"));
        assert_eq!(capture.interface.as_deref(), Some("eth1"));
        assert_eq!(capture.filter, "udp port 9999");
        assert_eq!(capture.tool, PathBuf::from("tcpdump"));
    }

    #[test]
    fn udp_and_dns_options_are_forwarded() {
        let cfg = parse(&[
            "--mode",
            "dns",
            "--udp-payload-size",
            "0",
            "--udp-await-reply",
            "--dns-name",
            "intranet.lan",
            "--dns-port",
            "5353",
            "--dns-backend",
            "nslookup",
        ])
        .into_run_config()
        .unwrap();

        assert_eq!(cfg.probe.udp.payload_size, 1);
        assert!(cfg.probe.udp.await_reply);
        assert_eq!(cfg.probe.dns.query_name, "intranet.lan");
        assert_eq!(cfg.probe.dns.port, 5353);
        assert_eq!(cfg.probe.dns.backend, DnsBackend::Nslookup);
    }

    #[test]
    fn negative_interval_is_rejected() {
        let err = parse(&["--mode", "tcp", "--interval", "-1"])
            .into_run_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval(_)));
    }

    #[test]
    fn fractional_interval_is_kept() {
        let cfg = parse(&["--mode", "tcp", "--interval", "0.25"])
            .into_run_config()
            .unwrap();
        assert_eq!(cfg.interval, Duration::from_millis(250));
    }
}
