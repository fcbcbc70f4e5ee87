//! Entry point for `rdt-over-udp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, sockets and files).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::fs::File;
use tokio::io::BufReader;

use rdt_over_udp::simulator::SimulatorConfig;
use rdt_over_udp::stream::{LineSource, WriterSink};
use rdt_over_udp::{ReceiverConfig, Receiver, Sender, SenderConfig, UdpTransport, SERVER_PORT};

/// Reliable stop-and-wait file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive a file, writing every delivered line to FILE.
    Server {
        /// Output file.
        file: PathBuf,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
        /// Port to listen on.
        #[arg(short, long, default_value_t = SERVER_PORT)]
        port: u16,
        /// Fraction of inbound data frames to drop on purpose (0.0 - 1.0).
        #[arg(long, default_value_t = 0.0)]
        drop_rate: f64,
        /// Seed for the drop simulator.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Send FILE line by line to HOST.
    Client {
        /// Server host name or address.
        host: String,
        /// Input file.
        file: PathBuf,
        /// Server port.
        #[arg(short, long, default_value_t = SERVER_PORT)]
        port: u16,
        /// Milliseconds to wait for an ACK before retransmitting.
        #[arg(long, default_value_t = 250)]
        timeout_ms: u64,
        /// Transmissions allowed per record before giving up.
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
        max_retries: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server {
            file,
            bind,
            port,
            drop_rate,
            seed,
        } => {
            let addr = resolve(&bind, port).await?;
            let config = ReceiverConfig {
                fault: (drop_rate > 0.0).then_some(SimulatorConfig {
                    loss_rate: drop_rate,
                    seed,
                }),
            };
            run_server(addr, file, config).await
        }
        Mode::Client {
            host,
            file,
            port,
            timeout_ms,
            max_retries,
        } => {
            let peer = resolve(&host, port).await?;
            let config = SenderConfig {
                ack_timeout: Duration::from_millis(timeout_ms),
                max_retries,
            };
            run_client(peer, file, config).await
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("unknown host: {host}"))?;
    match addrs.next() {
        Some(addr) => Ok(addr),
        None => bail!("unknown host: {host}"),
    }
}

async fn run_server(addr: SocketAddr, path: PathBuf, config: ReceiverConfig) -> Result<()> {
    let transport = UdpTransport::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    let file = File::create(&path)
        .await
        .with_context(|| format!("cannot open {}", path.display()))?;

    log::info!("Server up and awaiting packets on {}", transport.local_addr);
    let mut receiver = Receiver::new(transport, WriterSink::new(file), config);
    let summary = receiver.run().await?;
    println!(
        "Transmission complete: {} records ({} bytes) written to {}",
        summary.delivered,
        summary.bytes,
        path.display()
    );
    Ok(())
}

async fn run_client(peer: SocketAddr, path: PathBuf, config: SenderConfig) -> Result<()> {
    let file = File::open(&path)
        .await
        .with_context(|| format!("cannot open {}", path.display()))?;
    let local: SocketAddr = if peer.is_ipv4() {
        ([0u8; 4], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let transport = UdpTransport::bind(local)
        .await
        .context("cannot create socket")?;

    log::info!("Sending {} to {peer}", path.display());
    let mut sender = Sender::new(transport, peer, config);
    let mut source = LineSource::new(BufReader::new(file));
    let summary = sender
        .send_stream(&mut source)
        .await
        .context("transfer aborted")?;
    println!(
        "Send completed: {} records, {} retransmissions",
        summary.records,
        summary.retransmissions()
    );
    Ok(())
}
