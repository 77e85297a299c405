//! Layered configuration
//!
//! Sources, lowest priority first:
//! - Built-in defaults
//! - Optional TOML file (`drowsiness-monitor.toml`, or the path in `DROWSY_CONFIG`)
//! - Environment variables such as `DROWSY__CAMERA__INDEX=1`

use std::str::FromStr;

use camera_capture::CameraConfig;
use capture_loop::CaptureConfig;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Config file looked up when `DROWSY_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "drowsiness-monitor.toml";

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "DROWSY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub dms: DmsConfig,
    pub log: LogConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// JPEG quality for served frames (1-100)
    pub jpeg_quality: u8,
    /// Pause between MJPEG parts in milliseconds
    pub stream_interval_ms: u64,
    /// Start a monitoring session together with the server
    pub autostart: bool,
    /// Expose Prometheus metrics on /metrics
    pub metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            jpeg_quality: 90,
            stream_interval_ms: 33,
            autostart: false,
            metrics: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
    /// Also append plain log lines to this file (created with mode 0600)
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl LogConfig {
    pub fn max_level(&self) -> Result<Level, SettingsError> {
        Level::from_str(self.level.trim())
            .map_err(|_| SettingsError::Invalid(format!("unknown log level {:?}", self.level)))
    }
}

impl AppConfig {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var("DROWSY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path, ENV_PREFIX)
    }

    /// Load from `path` (optional) and variables prefixed `env_prefix__`
    pub fn load_from(path: &str, env_prefix: &str) -> Result<Self, SettingsError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(1..=100).contains(&self.server.jpeg_quality) {
            return Err(SettingsError::Invalid(format!(
                "server.jpeg_quality must be 1-100, got {}",
                self.server.jpeg_quality
            )));
        }
        if self.server.stream_interval_ms == 0 {
            return Err(SettingsError::Invalid("server.stream_interval_ms must be positive".into()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(SettingsError::Invalid("camera resolution must be non-zero".into()));
        }
        self.capture
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        self.dms
            .validate()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        self.log.max_level()?;
        Ok(())
    }
}
