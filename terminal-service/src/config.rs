//! Configuration loading and defaults.
//!
//! Resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `TERMSVC_LISTEN`, `RUST_LOG`
//! 2. **Config file** — path via `--config <path>`, or `terminal.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8081"
//! max_batch_size = 50
//!
//! [shell]
//! default_shell = "/bin/bash"
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
    pub shell: ShellConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:8081`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum commands accepted in one `POST .../commands/batch` request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Period between expiry sweeps, in seconds (default 600 = 10 min).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum number of in-flight HTTP requests served concurrently
    /// (default 512). Excess requests queue rather than spawning unbounded
    /// shells.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    /// Shell used when a session has no usable `SHELL` env entry.
    #[serde(default = "default_shell")]
    pub default_shell: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:8081".to_string()
}
fn default_max_batch_size() -> usize {
    50
}
fn default_sweep_interval_secs() -> u64 {
    600
}
fn default_max_connections() -> usize {
    512
}
fn default_shell() -> String {
    "/bin/bash".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_batch_size: default_max_batch_size(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            default_shell: default_shell(),
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
            shell: ShellConfig::default(),
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
        } else if Path::new("terminal.toml").exists() {
            let content =
                std::fs::read_to_string("terminal.toml").expect("failed to read terminal.toml");
            toml::from_str(&content).expect("failed to parse terminal.toml")
        } else {
            Config::default()
        };

        if let Ok(listen) = std::env::var("TERMSVC_LISTEN") {
            config.server.listen = listen;
        }

        config
    }
}
