//! RUDP Demo - Scripted loopback replay
//!
//! Drives one connection through a fixed sequence of sends, idle ticks and
//! injected peer datagrams, printing every generation cycle and delivery.

use clap::Parser;
use rudp_cli::{format_packets, hex};
use rudp_protocol::{Connection, ConnectionConfig, Delivery, Packet};

#[derive(Parser, Debug)]
#[command(name = "rudp-demo")]
#[command(about = "Replay a scripted RUDP exchange", long_about = None)]
struct Args {
    /// Ticks between generation cycles
    #[arg(long, default_value = "1")]
    send_delay: u64,

    /// Ticks sent messages stay available for retransmission
    #[arg(long, default_value = "5")]
    expire: u64,

    /// Packet capacity in bytes
    #[arg(long, default_value = "128")]
    capacity: usize,

    /// Print connection statistics at the end
    #[arg(long)]
    stats: bool,
}

/// One step of the replay
enum Step {
    Send(Vec<u8>),
    Update { input: Vec<u8>, ticks: u64 },
    Drain,
}

/// 256-byte payload, too large to share a 128-byte packet
fn oversized_payload() -> Vec<u8> {
    let mut payload = Vec::with_capacity(256);
    for _ in 0..31 {
        payload.extend_from_slice(&[2, 1, 1, 1, 1, 1, 1, 3]);
    }
    payload.extend_from_slice(&[2, 1, 1, 1, 10, 11, 12, 13]);
    payload
}

fn script() -> Vec<Step> {
    use Step::*;
    vec![
        Send(vec![1, 2, 3, 4]),
        Send(vec![5, 6, 7, 8]),
        Update { input: vec![], ticks: 1 },
        Update { input: vec![], ticks: 1 },
        Send(oversized_payload()),
        Send(vec![4, 3, 2, 1]),
        Update { input: vec![], ticks: 1 },
        // Peer asks for ids 0 and 3
        Update { input: vec![0x02, 0x00, 0x00, 0x02, 0x00, 0x03], ticks: 1 },
        Drain,
        // Peer data with ids 1 and 3, leaving gaps at 0 and 2
        Update { input: vec![5, 0, 1, 1, 5, 0, 3, 3], ticks: 1 },
        Drain,
        // Ids 0 and 5 arrive without advancing time
        Update { input: vec![5, 0, 0, 0, 5, 0, 5, 5], ticks: 0 },
        Update { input: vec![5, 0, 2, 2], ticks: 1 },
        Drain,
    ]
}

fn print_cycle(cycle: usize, output: Option<Vec<Packet>>) {
    match output {
        None => println!("{} : not due", cycle),
        Some(packets) if packets.is_empty() => println!("{} : (no packets)", cycle),
        Some(packets) => {
            println!("{} :", cycle);
            for line in format_packets(&packets) {
                println!("{}", line);
            }
        }
    }
}

fn drain(connection: &mut Connection) {
    loop {
        match connection.receive() {
            Delivery::Empty => return,
            Delivery::Data(payload) => println!("RECV: {}", hex(&payload)),
            Delivery::Error(e) => println!("RECV ERROR: {}", e),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ConnectionConfig::new(args.send_delay, args.expire).with_packet_capacity(args.capacity);
    let mut connection = Connection::with_config(config)?;

    let mut cycle = 0;
    for step in script() {
        match step {
            Step::Send(payload) => {
                let id = connection.send(&payload)?;
                tracing::debug!(%id, len = payload.len(), "queued");
            }
            Step::Update { input, ticks } => {
                let output = connection.update(&input, ticks);
                print_cycle(cycle, output);
                cycle += 1;
            }
            Step::Drain => drain(&mut connection),
        }
    }

    if args.stats {
        println!("{:#?}", connection.stats());
    }

    Ok(())
}
