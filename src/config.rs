use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::http::connection::Timeouts;

/// Server runtime configuration.
///
/// Loaded from an optional YAML file (path in the `CONFIG_FILE`
/// environment variable), then overridden by individual environment
/// variables: `LISTEN`, `READ_TIMEOUT`, `WRITE_TIMEOUT`, `IDLE_TIMEOUT`
/// (seconds), `LOG_LEVEL`, and `FILES_ROOT`. Invalid numeric values fall
/// back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:4221".to_string(),
            read_timeout_secs: 5,
            write_timeout_secs: 5,
            idle_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./files"),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("CONFIG_FILE") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            Err(_) => Config::default(),
        };

        if let Ok(v) = std::env::var("LISTEN") {
            cfg.server.listen_addr = v;
        }
        cfg.server.read_timeout_secs = env_secs("READ_TIMEOUT", cfg.server.read_timeout_secs);
        cfg.server.write_timeout_secs = env_secs("WRITE_TIMEOUT", cfg.server.write_timeout_secs);
        cfg.server.idle_timeout_secs = env_secs("IDLE_TIMEOUT", cfg.server.idle_timeout_secs);
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            cfg.server.log_level = v;
        }
        if let Ok(v) = std::env::var("FILES_ROOT") {
            cfg.static_files.root = PathBuf::from(v);
        }

        Ok(cfg)
    }

    /// Connection deadlines derived from the configured seconds.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: Duration::from_secs(self.server.read_timeout_secs),
            write: Duration::from_secs(self.server.write_timeout_secs),
            idle: Duration::from_secs(self.server.idle_timeout_secs),
        }
    }

    /// Maximum tracing level for the subscriber; unknown values fall back
    /// to `info`.
    pub fn log_level(&self) -> tracing::Level {
        self.server
            .log_level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}

fn env_secs(key: &str, fallback: u64) -> u64 {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!("Invalid {} value {:?}, using default {}s", key, v, fallback);
            fallback
        }),
        Err(_) => fallback,
    }
}
