//! Connection parameters.
//!
//! ```toml
//! torii_url = "http://localhost:8080"
//! rpc_url = "http://localhost:5050"
//! world_address = "0x0525177c8afe8680d7ad1da30ca183e482cfcd6404c1e09d83fd3fa2994fd4b8"
//! ```
//!
//! Values are handed to the backend as-is; the remote validates them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TORII_URL: &str = "http://localhost:8080";
pub const DEFAULT_RPC_URL: &str = "http://localhost:5050";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Where to find the indexer, the chain node, and which world to follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub torii_url: String,
    pub rpc_url: String,
    pub world_address: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            torii_url: DEFAULT_TORII_URL.to_owned(),
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            world_address: String::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(
        torii_url: impl Into<String>,
        rpc_url: impl Into<String>,
        world_address: impl Into<String>,
    ) -> Self {
        Self {
            torii_url: torii_url.into(),
            rpc_url: rpc_url.into(),
            world_address: world_address.into(),
        }
    }

    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!("loaded client config from {:?}", path);
        Ok(config)
    }
}
