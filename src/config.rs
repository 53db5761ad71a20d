//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the file engine, `None` selects the memory engine
    pub data_dir: Option<PathBuf>,
    /// Database name used by engines that need one
    pub store_name: String,
    /// Table the transient store is bound to
    pub table_name: String,
    /// TTL in milliseconds for bundles set without explicit TTL
    pub default_ttl_ms: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DATA_DIR` - File engine root (default: unset, in-memory engine)
    /// - `STORE_NAME` - Database name (default: transient-store)
    /// - `TABLE_NAME` - Table of the transient store (default: bundles)
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 900000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            store_name: env::var("STORE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.store_name),
            table_name: env::var("TABLE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.table_name),
            default_ttl_ms: env::var("DEFAULT_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl_ms),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Default TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            store_name: "transient-store".to_string(),
            table_name: "bundles".to_string(),
            default_ttl_ms: 900_000,
            server_port: 3000,
        }
    }
}
