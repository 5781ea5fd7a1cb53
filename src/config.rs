// Configuration File Support
//
// This module provides configuration file parsing for the Pictor client.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/pictor/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Generation API configuration
    pub api: ApiConfig,

    /// Poll loop configuration
    pub polling: PollingConfig,

    /// Usage tracking configuration
    pub usage: UsageConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Generation API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Service endpoint, trailing slash expected
    pub endpoint: String,

    /// Bearer token for the service; usually set via PICTOR_API_KEY
    pub api_key: Option<String>,

    /// Model identifier sent with every job
    pub model: String,

    /// Default output resolution
    pub default_resolution: String,

    /// Default aspect ratio
    pub default_aspect_ratio: String,

    /// Default output format
    pub default_output_format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.kie.ai/api/v1/jobs/".to_string(),
            api_key: None,
            model: "image-gen-pro".to_string(),
            default_resolution: "4K".to_string(),
            default_aspect_ratio: "3:4".to_string(),
            default_output_format: "png".to_string(),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between status queries, in milliseconds
    pub interval_ms: u64,

    /// Status-query budget before a job times out
    pub max_polls: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3000,
            max_polls: 60,
        }
    }
}

impl PollingConfig {
    /// Interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Usage tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsageConfig {
    /// Enable quota tracking; disabling admits everything
    pub enabled: bool,

    /// Fraction of a limit at which warnings start (0.0 to 1.0)
    pub warning_threshold: f64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_threshold: 0.8,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted records; defaults to the XDG data dir
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the data directory, falling back to the XDG data dir
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "pictor", "Pictor") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local").join("share").join("pictor")
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            usage: UsageConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        // Apply environment variable overrides
        let config = config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/pictor/config.toml` on Linux/Mac
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "pictor", "Pictor") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("pictor")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - PICTOR_API_ENDPOINT
    /// - PICTOR_API_KEY
    /// - PICTOR_MODEL
    /// - PICTOR_POLL_INTERVAL_MS
    /// - PICTOR_MAX_POLLS
    /// - PICTOR_USAGE_ENABLED
    /// - PICTOR_WARNING_THRESHOLD
    /// - PICTOR_DATA_DIR
    /// - PICTOR_LOG_LEVEL
    /// - PICTOR_LOG_FORMAT
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("PICTOR_API_ENDPOINT") {
            self.api.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("PICTOR_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("PICTOR_MODEL") {
            self.api.model = model;
        }

        if let Ok(interval) = std::env::var("PICTOR_POLL_INTERVAL_MS") {
            if let Ok(interval) = interval.parse::<u64>() {
                if interval > 0 {
                    self.polling.interval_ms = interval;
                }
            }
        }
        if let Ok(max_polls) = std::env::var("PICTOR_MAX_POLLS") {
            if let Ok(max_polls) = max_polls.parse::<u32>() {
                if max_polls > 0 {
                    self.polling.max_polls = max_polls;
                }
            }
        }

        if let Ok(enabled) = std::env::var("PICTOR_USAGE_ENABLED") {
            self.usage.enabled = enabled.parse().unwrap_or(self.usage.enabled);
        }
        if let Ok(threshold) = std::env::var("PICTOR_WARNING_THRESHOLD") {
            if let Ok(threshold) = threshold.parse::<f64>() {
                if (0.0..=1.0).contains(&threshold) {
                    self.usage.warning_threshold = threshold;
                }
            }
        }

        if let Ok(dir) = std::env::var("PICTOR_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(level) = std::env::var("PICTOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PICTOR_LOG_FORMAT") {
            self.logging.format = format;
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate API configuration
        if self.api.endpoint.is_empty() {
            anyhow::bail!("API endpoint must not be empty");
        }
        if self.api.model.is_empty() {
            anyhow::bail!("API model must not be empty");
        }

        // Validate polling configuration
        if self.polling.interval_ms == 0 {
            anyhow::bail!("Poll interval must be > 0 ms");
        }
        if self.polling.max_polls == 0 {
            anyhow::bail!("Max polls must be > 0");
        }

        // Validate usage configuration
        if !(0.0..=1.0).contains(&self.usage.warning_threshold) {
            anyhow::bail!(
                "Warning threshold must be between 0.0 and 1.0, got {}",
                self.usage.warning_threshold
            );
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
