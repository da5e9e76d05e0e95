//! Process configuration.
//!
//! Defaults are overridable from a TOML file and, for the store connection,
//! from environment variables so credentials stay out of config files.

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{GraphKbError, Result};
use crate::store::PoolOpts;

/// Store connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL of the graph store's HTTP API.
    pub url: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub pool_size: usize,
    pub query_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            url: "http://localhost:2480".to_string(),
            database: "graphkb".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            pool_size: 25,
            query_timeout_ms: 30_000,
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Loads configuration from an optional TOML file, then applies
    /// environment overrides (`GRAPHKB_DB_URL`, `GRAPHKB_DB_NAME`,
    /// `GRAPHKB_DB_USER`, `GRAPHKB_DB_PASS`).
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|err| {
                    GraphKbError::Validation(format!(
                        "cannot read config {}: {err}",
                        path.display()
                    ))
                })?;
                toml::from_str(&raw).map_err(|err| {
                    GraphKbError::Validation(format!(
                        "malformed config {}: {err}",
                        path.display()
                    ))
                })?
            }
            None => Config::default(),
        };
        if let Ok(url) = std::env::var("GRAPHKB_DB_URL") {
            config.store.url = url;
        }
        if let Ok(database) = std::env::var("GRAPHKB_DB_NAME") {
            config.store.database = database;
        }
        if let Ok(username) = std::env::var("GRAPHKB_DB_USER") {
            config.store.username = username;
        }
        if let Ok(password) = std::env::var("GRAPHKB_DB_PASS") {
            config.store.password = password;
        }
        Ok(config)
    }

    pub fn pool_opts(&self) -> PoolOpts {
        PoolOpts {
            size: self.store.pool_size,
            query_timeout: Duration::from_millis(self.store.query_timeout_ms),
        }
    }
}
