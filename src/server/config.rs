//! Server configuration types
//!
//! Contains all configuration structures for the Alembic server.

use alembic_core::{EngineConfig, ModelPaths};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub models: ModelPaths,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Front-end origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
    /// Also write logs to a daily file
    #[serde(default = "default_true")]
    pub file_enabled: bool,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file_enabled: true,
        }
    }
}

/// Live-channel pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Pause between progressive suggestion updates
    #[serde(default = "default_progressive_delay_ms")]
    pub progressive_delay_ms: u64,
}

fn default_progressive_delay_ms() -> u64 {
    100
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            progressive_delay_ms: default_progressive_delay_ms(),
        }
    }
}
