//! Configuration file support for the RUDP CLI tools

use rudp_protocol::{ConnectionConfig, MessageId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Local socket and peer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSection {
    /// Local bind address
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Remote peer address
    pub peer: Option<SocketAddr>,
    /// Wall-clock length of one protocol tick, in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Statistics interval in seconds (0 disables)
    #[serde(default)]
    pub stats_interval_secs: u64,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9000))
}

fn default_tick_ms() -> u64 {
    10
}

impl Default for EndpointSection {
    fn default() -> Self {
        EndpointSection {
            bind: default_bind(),
            peer: None,
            tick_ms: default_tick_ms(),
            stats_interval_secs: 0,
        }
    }
}

/// Protocol tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSection {
    /// Ticks between generation cycles
    #[serde(default = "default_send_delay")]
    pub send_delay: u64,
    /// Ticks a sent message stays available for retransmission
    #[serde(default = "default_expired_after")]
    pub expired_after: u64,
    /// Packet capacity in bytes
    #[serde(default = "default_packet_capacity")]
    pub packet_capacity: usize,
    /// First message id; both peers must agree
    #[serde(default)]
    pub initial_id: i64,
}

fn default_send_delay() -> u64 {
    1
}

fn default_expired_after() -> u64 {
    5
}

fn default_packet_capacity() -> usize {
    rudp_protocol::DEFAULT_PACKET_CAPACITY
}

impl Default for ProtocolSection {
    fn default() -> Self {
        ProtocolSection {
            send_delay: default_send_delay(),
            expired_after: default_expired_after(),
            packet_capacity: default_packet_capacity(),
            initial_id: 0,
        }
    }
}

impl ProtocolSection {
    /// Build and validate the connection configuration
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConfigError> {
        let config = ConnectionConfig::new(self.send_delay, self.expired_after)
            .with_packet_capacity(self.packet_capacity)
            .with_initial_id(MessageId::new(self.initial_id));
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

/// Combined configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointSection,
    #[serde(default)]
    pub protocol: ProtocolSection,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Example configuration for a peer on localhost
    pub fn example() -> Self {
        Config {
            endpoint: EndpointSection {
                bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 9000)),
                peer: Some(SocketAddr::from((Ipv4Addr::LOCALHOST, 9001))),
                tick_ms: 10,
                stats_interval_secs: 5,
            },
            protocol: ProtocolSection::default(),
        }
    }

    /// Check the configuration as a whole
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be at least 1".into()));
        }
        self.protocol.connection_config()?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl EndpointSection {
    /// Tick length as Duration
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Statistics interval as Duration, `None` when disabled
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}
