//! Server configuration, stored as JSON in PANDORA_HOME

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default gRPC port of the Pandora test servers.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8999";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the gRPC server binds to
    pub listen_addr: String,
    /// Index into the platform's adapter list
    pub adapter_index: usize,
    /// Upper bound on waiting for a single platform callback
    pub callback_timeout_ms: u64,
    /// Settle time before a by-UUID discovery, the platform may still be
    /// running the discovery it started on connection
    pub discovery_by_uuid_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            adapter_index: 0,
            callback_timeout_ms: 60_000,
            discovery_by_uuid_delay_ms: 32_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid listen address {addr}: {source}")]
    ListenAddr {
        addr: String,
        source: std::net::AddrParseError,
    },
}

impl Config {
    /// Load the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|source| ConfigError::ListenAddr {
                addr: self.listen_addr.clone(),
                source,
            })
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    pub fn discovery_by_uuid_delay(&self) -> Duration {
        Duration::from_millis(self.discovery_by_uuid_delay_ms)
    }
}

/// PANDORA_HOME, or ~/.pandora when unset
pub fn pandora_home() -> PathBuf {
    std::env::var("PANDORA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".pandora")
        })
}

pub fn default_config_path() -> PathBuf {
    pandora_home().join("gatt.json")
}
