use std::time::Duration;

use tempfile::TempDir;
use trafgen_common::network::target;
use trafgen_common::{Mode, ProbeConfig};
use trafgen_core::session::{self, CaptureSettings, RunConfig};
use trafgen_core::RunError;

#[tokio::test]
async fn trivially_local_names_pass_the_gate() {
    for host in ["localhost", "127.0.0.1", "::1", "10.1.2.3", "192.168.0.10", "fd00::1"] {
        assert!(target::is_local(host).await, "{host} should be local");
    }
}

#[tokio::test]
async fn public_and_unresolvable_targets_fail_the_gate() {
    for host in ["8.8.8.8", "2001:4860:4860::8888", "does-not-exist.invalid"] {
        assert!(!target::is_local(host).await, "{host} should be rejected");
    }
}

#[tokio::test]
async fn refused_run_creates_no_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("csv/log.csv");
    let pcap = dir.path().join("run.pcap");
    let cfg = RunConfig::new("8.8.8.8", ProbeConfig::new(Mode::Icmp))
        .with_output(&output)
        .with_capture(Some(CaptureSettings::new(&pcap)));

    let err = session::run_until(cfg, std::future::pending())
        .await
        .expect_err("external target must be refused");

    assert!(matches!(err, RunError::UnsafeTarget { .. }));
    assert!(!output.exists());
    assert!(!pcap.exists());
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

/// Probes a public resolver; needs internet access.
#[tokio::test]
#[ignore]
async fn allow_external_lifts_the_gate() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("log.csv");
    let probe = ProbeConfig::new(Mode::Tcp).with_port(53).with_timeout_ms(2000);
    let cfg = RunConfig::new("8.8.8.8", probe)
        .with_allow_external(true)
        .with_samples(1)
        .with_interval(Duration::ZERO)
        .with_output(&output);

    let summary = session::run_until(cfg, std::future::pending()).await?;
    assert_eq!(summary.rows, 1);
    Ok(())
}
