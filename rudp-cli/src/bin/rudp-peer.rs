//! RUDP Peer - Interactive messaging over UDP
//!
//! Sends each stdin line as one message to a fixed peer and prints every
//! message delivered from it.

use anyhow::Context;
use clap::Parser;
use crossbeam::channel::{self, Receiver};
use crossbeam::select;
use rudp::{Connection, Delivery, Endpoint, RudpSocket};
use rudp_cli::{compact_stats, display_connection_stats, Config};
use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "rudp-peer")]
#[command(about = "Reliable ordered messaging with one UDP peer", long_about = None)]
struct Args {
    /// Local bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Peer address
    #[arg(short, long)]
    peer: Option<SocketAddr>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write an example configuration to this path and exit
    #[arg(long)]
    write_example: Option<PathBuf>,

    /// Ticks between generation cycles
    #[arg(long)]
    send_delay: Option<u64>,

    /// Ticks sent messages stay available for retransmission
    #[arg(long)]
    expire: Option<u64>,

    /// Tick length in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Statistics interval in seconds (0 disables)
    #[arg(long)]
    stats: Option<u64>,
}

impl Args {
    /// Configuration file values, overridden by command-line flags
    fn resolve(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?,
            None => Config::default(),
        };

        if let Some(bind) = self.bind {
            config.endpoint.bind = bind;
        }
        if let Some(peer) = self.peer {
            config.endpoint.peer = Some(peer);
        }
        if let Some(tick_ms) = self.tick_ms {
            config.endpoint.tick_ms = tick_ms;
        }
        if let Some(stats) = self.stats {
            config.endpoint.stats_interval_secs = stats;
        }
        if let Some(send_delay) = self.send_delay {
            config.protocol.send_delay = send_delay;
        }
        if let Some(expire) = self.expire {
            config.protocol.expired_after = expire;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Forward stdin lines until EOF
fn spawn_stdin_reader() -> anyhow::Result<Receiver<String>> {
    let (tx, rx) = channel::unbounded();
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("stdin read failed: {}", e);
                        return;
                    }
                }
            }
        })?;
    Ok(rx)
}

fn print_delivery(delivery: Delivery) {
    match delivery {
        Delivery::Data(payload) => println!("< {}", String::from_utf8_lossy(&payload)),
        Delivery::Error(e) => tracing::warn!("Delivery error: {}", e),
        Delivery::Empty => {}
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Some(path) = &args.write_example {
        Config::example().to_file(path)?;
        println!("Wrote example configuration to {}", path.display());
        return Ok(());
    }

    let config = args.resolve()?;
    let peer = config
        .endpoint
        .peer
        .context("No peer address (use --peer or [endpoint] peer)")?;

    let socket = RudpSocket::bind(config.endpoint.bind)?;
    tracing::info!("Listening on: {}", socket.local_addr()?);
    tracing::info!("Peer: {}", peer);

    let connection = Connection::with_config(config.protocol.connection_config()?)?;
    let tick = config.endpoint.tick();
    let endpoint = Endpoint::new(socket, peer, connection, tick);
    let handle = endpoint.spawn((tick / 2).max(Duration::from_millis(1)))?;

    let lines = spawn_stdin_reader()?;
    let stats_ticker = match config.endpoint.stats_interval() {
        Some(interval) => channel::tick(interval),
        None => channel::never(),
    };
    let start = Instant::now();

    loop {
        select! {
            recv(lines) -> line => match line {
                Ok(line) => {
                    let id = handle.send(line.as_bytes())?;
                    tracing::debug!(%id, "sent");
                }
                Err(_) => {
                    tracing::info!("stdin closed");
                    break;
                }
            },
            recv(handle.deliveries()) -> delivery => match delivery {
                Ok(delivery) => print_delivery(delivery),
                Err(_) => anyhow::bail!("Endpoint stopped unexpectedly"),
            },
            recv(stats_ticker) -> _ => {
                eprintln!("{}", compact_stats(&handle.stats(), start.elapsed()));
            }
        }
    }

    // Keep serving resend requests while the history is still alive
    let linger = tick.saturating_mul(u32::try_from(config.protocol.expired_after).unwrap_or(u32::MAX));
    let deadline = Instant::now() + linger;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        if let Some(delivery) = handle.recv_timeout(remaining)? {
            print_delivery(delivery);
        }
    }

    let stats = handle.stats();
    handle.shutdown();
    display_connection_stats(&stats, start.elapsed());

    Ok(())
}
