use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Environment variable holding the path of the server's TOML config file.
pub const CONFIG_PATH_ENV: &str = "RESERVATION_SERVICE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub account: AccountConfig,
    pub cassandra: CassandraConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CassandraConfig {
    /// Contact points of the cluster.
    pub points: Vec<String>,
    pub keyspace: String,
    pub repl_factor: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Client-side endpoint; consumed by the CLI, carried here so one config
    /// file serves both processes.
    pub client: Endpoint,
    pub server: Endpoint,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub ip: String,
    pub port: u16,
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            bail!("could not load server config: {} is a directory", path.display());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not load server config: {}", path.display()))?;
        let config: ServiceConfig = toml::from_str(&raw)
            .with_context(|| format!("invalid server config: {}", path.display()))?;
        if config.cassandra.points.is_empty() {
            bail!("invalid server config: cassandra.points must not be empty");
        }
        Ok(config)
    }
}
