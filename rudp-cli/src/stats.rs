//! Statistics display and formatting

use rudp_protocol::{ConnectionStats, Packet};
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Lowercase hex, two digits per byte, no separators
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// One line per packet: index, length, hex payload
pub fn format_packets(packets: &[Packet]) -> Vec<String> {
    packets
        .iter()
        .enumerate()
        .map(|(i, packet)| format!("  [{}] {:3} bytes  {}", i, packet.len(), hex(packet.as_bytes())))
        .collect()
}

/// Display connection statistics as a table
pub fn display_connection_stats(stats: &ConnectionStats, uptime: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ CONNECTION STATISTICS                                       │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Uptime:       {:<46}│", format_duration(uptime));
    println!(
        "│ Messages:     {:<46}│",
        format!(
            "{} sent / {} received / {} delivered",
            stats.messages_sent, stats.messages_received, stats.messages_delivered
        )
    );
    println!(
        "│ Packets:      {:<46}│",
        format!("{} generated ({})", stats.packets_generated, format_bytes(stats.bytes_generated))
    );
    println!("│ Ingested:     {:<46}│", format_bytes(stats.bytes_ingested));
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ RECOVERY                                                    │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!(
        "│ Requests:     {:<46}│",
        format!("{} sent / {} received", stats.requests_sent, stats.requests_received)
    );
    println!("│ Resent:       {:<46}│", stats.retransmissions);
    println!(
        "│ Missing:      {:<46}│",
        format!("{} sent / {} received", stats.missing_sent, stats.missing_received)
    );
    println!("│ Expired:      {:<46}│", stats.history_expired);
    println!("│ Duplicates:   {:<46}│", stats.duplicates_dropped);
    println!("│ Invalid:      {:<46}│", stats.invalid_frames);
    println!("│ Heartbeats:   {:<46}│", stats.heartbeats_sent);
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Compact stats on one line
pub fn compact_stats(stats: &ConnectionStats, uptime: Duration) -> String {
    format!(
        "[{:8}] Sent: {} | Delivered: {} | Out: {} | Resent: {} | Missing: {}",
        format_duration(uptime),
        stats.messages_sent,
        stats.messages_delivered,
        format_bytes(stats.bytes_generated),
        stats.retransmissions,
        stats.missing_sent + stats.missing_received,
    )
}
