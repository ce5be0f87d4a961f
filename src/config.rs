//! Node configuration, read from an optional TOML file

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::path::Path;

use crate::blockchain::transaction::Amount;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CRYPTOLEDGER_CONFIG";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Rules every node on the network must agree on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: Amount,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            mining_reward: default_mining_reward(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_starting_balance() -> Amount {
    1000
}

fn default_mining_reward() -> Amount {
    50
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file named by `CRYPTOLEDGER_CONFIG`, or falls back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
