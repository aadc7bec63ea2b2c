//! Configuration loading and defaults.
//!
//! Resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `FILESVC_LISTEN`, `RUST_LOG`
//! 2. **Config file** — path via `--config <path>`, or `file.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! max_file_size = 2097152
//! sweep_interval_secs = 600
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum size in bytes for a single file read or write (default 2 MB).
    /// Reads/writes beyond this return `InvalidArgument` (`FILE_TOO_LARGE`)
    /// rather than truncating silently.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Period between expiry sweeps, in seconds (default 600 = 10 min).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Default depth cap for `ExportStructure` / `ProjectContext::Walk` when
    /// the caller doesn't specify one (default 8).
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,
    /// Maximum number of in-flight HTTP requests served concurrently
    /// (default 512). Excess requests queue rather than piling up
    /// concurrent directory walks.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_max_file_size() -> usize {
    2 * 1024 * 1024
}
fn default_sweep_interval_secs() -> u64 {
    600
}
fn default_max_walk_depth() -> usize {
    8
}
fn default_max_connections() -> usize {
    512
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_file_size: default_max_file_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_walk_depth: default_max_walk_depth(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("failed to parse config file {p}: {e}"))
        } else if Path::new("file.toml").exists() {
            let content =
                std::fs::read_to_string("file.toml").expect("failed to read file.toml");
            toml::from_str(&content).expect("failed to parse file.toml")
        } else {
            Config::default()
        };

        if let Ok(listen) = std::env::var("FILESVC_LISTEN") {
            config.server.listen = listen;
        }

        config
    }
}
