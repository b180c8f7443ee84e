// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Cadence of the idle-session sweep, in seconds.
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
    /// Missed polls a Pending session survives before eviction.
    #[serde(default = "default_missed_poll_threshold")]
    pub missed_poll_threshold: i64,
    /// Delay before a requeued queue message is redelivered, in milliseconds.
    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            path: default_workspace_path(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: default_monitor_interval_secs(),
            missed_poll_threshold: default_missed_poll_threshold(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workspace_path() -> String {
    "./workspace".to_string()
}

fn default_monitor_interval_secs() -> u64 {
    10
}

fn default_missed_poll_threshold() -> i64 {
    3
}

fn default_redelivery_delay_ms() -> u64 {
    500
}

impl Config {
    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("PARLEY_CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = if Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path))?
        } else {
            Config {
                server: ServerConfig::default(),
                workspace: WorkspaceConfig::default(),
                dispatch: DispatchConfig::default(),
            }
        };

        // Override with environment variables if present
        if let Ok(val) = std::env::var("PARLEY_HOST") {
            config.server.host = val;
        }
        if let Ok(val) = std::env::var("PARLEY_PORT") {
            config.server.port = val
                .parse()
                .with_context(|| format!("PARLEY_PORT must be a valid port number, got: {}", val))?;
        }
        if let Ok(val) = std::env::var("WORKSPACE_PATH") {
            config.workspace.path = val;
        }
        if let Ok(val) = std::env::var("MONITOR_INTERVAL_SECS") {
            config.dispatch.monitor_interval_secs = val.parse().with_context(|| {
                format!("MONITOR_INTERVAL_SECS must be a number of seconds, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("MISSED_POLL_THRESHOLD") {
            config.dispatch.missed_poll_threshold = val.parse().with_context(|| {
                format!("MISSED_POLL_THRESHOLD must be an integer, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("REDELIVERY_DELAY_MS") {
            config.dispatch.redelivery_delay_ms = val.parse().with_context(|| {
                format!("REDELIVERY_DELAY_MS must be a number of milliseconds, got: {}", val)
            })?;
        }

        // Validate
        if config.workspace.path.trim().is_empty() {
            anyhow::bail!("workspace.path must not be empty");
        }
        if config.dispatch.monitor_interval_secs == 0 {
            anyhow::bail!("dispatch.monitor_interval_secs must be at least 1");
        }
        if config.dispatch.missed_poll_threshold < 0 {
            anyhow::bail!("dispatch.missed_poll_threshold must not be negative");
        }

        Ok(config)
    }
}
