/// Service configuration module
/// Bind address and snapshot location for the HTTP service

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding one `<tenant>.json` snapshot per tenant.
    pub data_dir: PathBuf,
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("ARR_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3001".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "Invalid bind address: {} ({})",
                    env::var("ARR_BIND_ADDR").unwrap_or_default(),
                    e
                ))
            })?;

        let data_dir = PathBuf::from(
            env::var("ARR_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
        );
        if data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "ARR_DATA_DIR must not be empty".to_string(),
            ));
        }

        info!(
            "API configuration loaded: bind_addr={}, data_dir={}",
            bind_addr,
            data_dir.display()
        );

        Ok(Self { bind_addr, data_dir })
    }
}
