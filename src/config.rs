//! Configuration for Harken core
//!
//! One explicit struct, constructed at startup and passed into each
//! component; nothing reads configuration through a global.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Harken configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serve the status web listener (server role)
    pub use_web_server: bool,

    /// Run the wireless comm service (client role)
    pub use_bluetooth: bool,

    /// Enable AirPlay media output routing
    pub use_airplay: bool,

    /// Enable the home-automation bridge
    pub use_home_assistant: bool,

    /// Port for the status web listener
    pub web_server_port: u16,

    /// Port the main transport listener binds, and the port clients
    /// connect out to
    pub main_server_port: u16,

    /// Server address an edge node connects to (client role)
    pub client_server_ip: String,

    /// Tokio worker threads (0 = runtime default)
    pub threads: usize,

    /// Transport tunables
    pub transport: TransportConfig,

    /// Supervisor tunables
    pub supervisor: SupervisorConfig,

    /// Dispatch tunables
    pub dispatch: DispatchConfig,
}

/// Session transport tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum concurrent TCP sessions; arrivals beyond this wait for a
    /// permit
    pub max_sessions: usize,

    /// Fixed backoff between outbound connection attempts, in
    /// milliseconds (no exponential growth, no retry limit)
    pub retry_backoff_ms: u64,
}

/// Service supervisor tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Poll interval of the monitoring loop, in milliseconds; bounds
    /// time-to-recovery after a service crash
    pub poll_interval_ms: u64,
}

/// Task dispatch tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Cadence of the queue poller, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_web_server: false,
            use_bluetooth: false,
            use_airplay: false,
            use_home_assistant: false,
            web_server_port: 8080,
            main_server_port: 7583,
            client_server_ip: "127.0.0.1".to_string(),
            threads: 0,
            transport: TransportConfig::default(),
            supervisor: SupervisorConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_sessions: 32,
            retry_backoff_ms: 5_000,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}

impl TransportConfig {
    /// Backoff between outbound connection attempts
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl SupervisorConfig {
    /// Poll interval of the monitoring loop
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl DispatchConfig {
    /// Cadence of the queue poller
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
