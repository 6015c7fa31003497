//! Server configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via DOCWIRE_CONFIG or --config)
//! 3. Environment variables

use docwire_bson::pool::DEFAULT_PURGE_INTERVAL;
use docwire_bson::{AllocationStrategy, PoolPolicyKind};
use docwire_protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network configuration.
    pub network: NetworkConfig,
    /// Document decoding configuration.
    pub codec: CodecConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("DOCWIRE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.network.apply_env_overrides();
        self.codec.apply_env_overrides();
        self.metrics.apply_env_overrides();
    }

    /// Checks values that deserialize fine but cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.max_connections == 0 {
            return Err(ConfigError::Validation(
                "network.max_connections must be at least 1".to_string(),
            ));
        }
        if self.codec.pool_purge_interval == 0 {
            return Err(ConfigError::Validation(
                "codec.pool_purge_interval must be at least 1".to_string(),
            ));
        }
        if self.metrics.enabled && self.metrics.bind_addr == self.network.bind_addr {
            return Err(ConfigError::Validation(format!(
                "metrics and protocol listeners both bind {}",
                self.network.bind_addr
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            idle_timeout_secs: 300,
            max_connections: 1000,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(addr) = env_parse("DOCWIRE_BIND") {
            self.bind_addr = addr;
        }
        if let Some(secs) = env_parse("DOCWIRE_IDLE_TIMEOUT") {
            self.idle_timeout_secs = secs;
        }
        if let Some(n) = env_parse("DOCWIRE_MAX_CONNECTIONS") {
            self.max_connections = n;
        }
    }

    /// Returns idle timeout as Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Document decoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// How decoded documents hold their strings.
    pub allocation: AllocationStrategy,
    /// Which strings are deduplicated through the shared pool.
    pub string_pool: PoolPolicyKind,
    /// Pool insertions between sweeps of dead entries.
    pub pool_purge_interval: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationStrategy::default(),
            string_pool: PoolPolicyKind::default(),
            pool_purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

impl CodecConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(strategy) = env_parse("DOCWIRE_ALLOCATION") {
            self.allocation = strategy;
        }
        if let Some(kind) = env_parse("DOCWIRE_STRING_POOL") {
            self.string_pool = kind;
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics HTTP server.
    pub enabled: bool,
    /// Address to bind the metrics server to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
        }
    }
}

impl MetricsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(enabled) = std::env::var("DOCWIRE_METRICS_ENABLED") {
            self.enabled = enabled == "1" || enabled.eq_ignore_ascii_case("true");
        }
        if let Some(addr) = env_parse("DOCWIRE_METRICS_BIND") {
            self.bind_addr = addr;
        }
    }
}

/// Reads and parses an environment variable. Unparseable values are ignored
/// with a warning so a typo never prevents startup.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    Parse(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Serializes `SocketAddr` as a plain string in YAML.
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
