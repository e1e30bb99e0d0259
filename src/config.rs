//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Exporter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Metrics endpoint configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// MongoDB connection and scrape configuration.
    pub mongodb: MongoConfig,
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the `/metrics` endpoint binds to (e.g., "0.0.0.0:9216").
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9216))
}

/// Cluster topology the exporter is pointed at.
///
/// Standalone covers single mongod instances and replica-set members;
/// router covers mongos instances, where database-level stats arrive as a
/// per-shard map and gain a `shard` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyMode {
    #[default]
    Standalone,
    Router,
}

impl TopologyMode {
    /// Default set of system databases excluded from export.
    ///
    /// The two modes historically differ: mongos never special-cased
    /// `local`. The asymmetry is deliberate configuration, overridable via
    /// `exclude_databases`.
    pub fn default_exclusions(self) -> &'static [&'static str] {
        match self {
            Self::Standalone => &["admin", "test", "local"],
            Self::Router => &["admin", "test"],
        }
    }
}

/// MongoDB connection and scrape configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// Connection URI (e.g., "mongodb://localhost:27017").
    pub uri: String,
    /// Topology mode, selects label schema and default exclusions.
    #[serde(default)]
    pub mode: TopologyMode,
    /// Per stats-call deadline in seconds.
    #[serde(default = "default_stats_timeout_secs")]
    pub stats_timeout_secs: u64,
    /// Override for the excluded-database set. When absent, the per-mode
    /// default applies.
    pub exclude_databases: Option<Vec<String>>,
}

fn default_stats_timeout_secs() -> u64 {
    10
}

impl MongoConfig {
    /// Databases excluded from database- and collection-level export.
    pub fn excluded_databases(&self) -> Vec<String> {
        match &self.exclude_databases {
            Some(names) => names.clone(),
            None => self
                .mode
                .default_exclusions()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Per stats-call deadline.
    pub fn stats_timeout(&self) -> Duration {
        Duration::from_secs(self.stats_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
