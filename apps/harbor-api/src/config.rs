//! Server configuration.
//!
//! Loaded from environment variables with fallback to defaults. Engine
//! policy lives in `engine.toml`, see [`harbor_engine::EngineConfig`].

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080)
    pub bind_addr: SocketAddr,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Explicit engine.toml; the platform config dir is used otherwise
    pub engine_config: Option<PathBuf>,

    /// Seconds between resolved-conflict sweeps (default: 1 hour)
    pub cleanup_interval_secs: u64,

    /// Pool size (default: 5)
    pub db_max_connections: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = ServerConfig {
            bind_addr: lookup("HARBOR_BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HARBOR_BIND_ADDR".to_string()))?,

            database_path: lookup("HARBOR_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./harbor.db")),

            engine_config: lookup("HARBOR_ENGINE_CONFIG").map(PathBuf::from),

            cleanup_interval_secs: lookup("HARBOR_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|| "3600".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HARBOR_CLEANUP_INTERVAL_SECS".to_string()))?,

            db_max_connections: lookup("HARBOR_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HARBOR_DB_MAX_CONNECTIONS".to_string()))?,
        };

        if config.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("HARBOR_CLEANUP_INTERVAL_SECS".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("HARBOR_DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
