use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::{TcpListener, UdpSocket};
use trafgen_common::{Mode, ProbeConfig, Status};
use trafgen_core::session::{self, RunConfig};

const HEADER: &str = "timestamp,seq,mode,status,latency_ms_or_info";

struct Row {
    seq: u64,
    mode: String,
    status: String,
    value: String,
}

fn read_rows(path: &Path) -> anyhow::Result<Vec<Row>> {
    let contents = std::fs::read_to_string(path)?;
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(HEADER));

    lines
        .map(|line| {
            let fields: Vec<&str> = line.splitn(5, ',').collect();
            anyhow::ensure!(fields.len() == 5, "short row: {line}");
            Ok(Row {
                seq: fields[1].parse()?,
                mode: fields[2].to_string(),
                status: fields[3].to_string(),
                value: fields[4].to_string(),
            })
        })
        .collect()
}

fn closed_tcp_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

async fn local_run(cfg: RunConfig) -> anyhow::Result<session::RunSummary> {
    Ok(session::run_until(cfg, std::future::pending()).await?)
}

#[tokio::test]
async fn closed_port_yields_an_error_row_per_sample() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let output = dir.path().join("log.csv");
    let probe = ProbeConfig::new(Mode::Tcp)
        .with_port(closed_tcp_port()?)
        .with_timeout_ms(200);
    let cfg = RunConfig::new("127.0.0.1", probe)
        .with_samples(3)
        .with_interval(Duration::ZERO)
        .with_output(&output);

    let summary = local_run(cfg).await?;
    assert_eq!(summary.count(Status::Error), 3);

    let contents = std::fs::read_to_string(&output)?;
    assert_eq!(contents.lines().count(), 4);
    let rows = read_rows(&output)?;
    assert!(rows.iter().all(|r| r.status == "error" && r.mode == "tcp"));
    assert!(rows.iter().all(|r| !r.value.is_empty()));
    Ok(())
}

#[tokio::test]
async fn open_port_reports_connect_latency() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move { while listener.accept().await.is_ok() {} });

    let dir = TempDir::new()?;
    let output = dir.path().join("log.csv");
    let cfg = RunConfig::new("localhost", ProbeConfig::new(Mode::Tcp).with_port(port))
        .with_samples(2)
        .with_interval(Duration::from_millis(10))
        .with_output(&output);

    local_run(cfg).await?;
    for row in read_rows(&output)? {
        assert_eq!(row.status, "ok");
        let latency: f64 = row.value.parse()?;
        assert!(latency >= 0.0);
        assert_eq!(row.value.split('.').nth(1).map(str::len), Some(3));
    }
    Ok(())
}

#[tokio::test]
async fn udp_echo_yields_ok_reply() -> anyhow::Result<()> {
    let echo = UdpSocket::bind("127.0.0.1:0").await?;
    let port = echo.local_addr()?.port();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((len, peer)) = echo.recv_from(&mut buf).await {
            let _ = echo.send_to(&buf[..len], peer).await;
        }
    });

    let dir = TempDir::new()?;
    let output = dir.path().join("log.csv");
    let probe = ProbeConfig::new(Mode::Udp)
        .with_port(port)
        .with_udp_await_reply(true);
    let cfg = RunConfig::new("127.0.0.1", probe)
        .with_samples(1)
        .with_output(&output);

    local_run(cfg).await?;
    let rows = read_rows(&output)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "ok-reply");
    assert!(rows[0].value.parse::<f64>()? >= 0.0);
    Ok(())
}

#[tokio::test]
async fn silent_udp_peer_yields_no_reply() -> anyhow::Result<()> {
    let sink = UdpSocket::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = sink.local_addr()?;

    let dir = TempDir::new()?;
    let output = dir.path().join("log.csv");
    let probe = ProbeConfig::new(Mode::Udp)
        .with_port(addr.port())
        .with_udp_await_reply(true)
        .with_timeout_ms(100);
    let cfg = RunConfig::new("127.0.0.1", probe)
        .with_samples(2)
        .with_interval(Duration::ZERO)
        .with_output(&output);

    let summary = local_run(cfg).await?;
    assert_eq!(summary.count(Status::NoReply), 2);
    assert!(read_rows(&output)?.iter().all(|r| r.value.is_empty()));
    Ok(())
}

#[tokio::test]
async fn sequence_numbers_are_dense_and_ordered() -> anyhow::Result<()> {
    let sink = UdpSocket::bind("127.0.0.1:0").await?;
    let port = sink.local_addr()?.port();

    let dir = TempDir::new()?;
    let output = dir.path().join("nested/dir/log.csv");
    let cfg = RunConfig::new("127.0.0.1", ProbeConfig::new(Mode::Udp).with_port(port))
        .with_samples(7)
        .with_interval(Duration::ZERO)
        .with_output(&output);

    let summary = local_run(cfg).await?;
    assert_eq!(summary.rows, 7);
    assert_eq!(summary.count(Status::Sent), 7);

    let seqs: Vec<u64> = read_rows(&output)?.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, (0..7).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn dns_against_local_resolver_is_ok() -> anyhow::Result<()> {
    let resolver = UdpSocket::bind("127.0.0.1:0").await?;
    let port = resolver.local_addr()?.port();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((len, peer)) = resolver.recv_from(&mut buf).await {
            let mut reply = buf[..len].to_vec();
            reply[2] |= 0x80;
            let _ = resolver.send_to(&reply, peer).await;
        }
    });

    let dir = TempDir::new()?;
    let output = dir.path().join("log.csv");
    let probe = ProbeConfig::new(Mode::Dns)
        .with_dns_port(port)
        .with_dns_name("printer.lan");
    let cfg = RunConfig::new("127.0.0.1", probe)
        .with_samples(2)
        .with_interval(Duration::ZERO)
        .with_output(&output);

    let summary = local_run(cfg).await?;
    assert_eq!(summary.count(Status::Ok), 2);
    Ok(())
}
