//! RUDP CLI Library
//!
//! Shared functionality for the RUDP command-line tools.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, EndpointSection, ProtocolSection};
pub use stats::{compact_stats, display_connection_stats, format_bytes, format_packets, hex};
