//! Configuration for the pool

use crate::types::TokenMetadata;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Liquidity share token configuration
    pub share_token: ShareTokenConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Snapshot storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "pool-core".to_string(),
            share_token: ShareTokenConfig::default(),
            actor: ActorConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Liquidity share token metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareTokenConfig {
    /// Token name
    pub name: String,

    /// Token symbol
    pub symbol: String,

    /// Display decimals
    pub decimals: u8,
}

impl Default for ShareTokenConfig {
    fn default() -> Self {
        Self {
            name: "lpToken".to_string(),
            symbol: "LPT".to_string(),
            decimals: 18,
        }
    }
}

impl ShareTokenConfig {
    /// Metadata for a new share ledger
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory for snapshots
    pub data_dir: PathBuf,

    /// Snapshot file name inside `data_dir`
    pub snapshot_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/pool"),
            snapshot_file: "pool.snapshot".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML document; missing keys keep their defaults
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("POOL_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(level) = std::env::var("POOL_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(json) = std::env::var("POOL_LOG_JSON") {
            config.logging.json = json
                .parse()
                .map_err(|_| crate::Error::Config(format!("POOL_LOG_JSON is not a bool: {}", json)))?;
        }

        if let Ok(capacity) = std::env::var("POOL_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|_| {
                crate::Error::Config(format!("POOL_MAILBOX_CAPACITY is not a number: {}", capacity))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pool cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }
        if self.share_token.symbol.is_empty() {
            return Err(crate::Error::Config(
                "share_token.symbol must not be empty".to_string(),
            ));
        }
        if self.storage.snapshot_file.is_empty() {
            return Err(crate::Error::Config(
                "storage.snapshot_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
