//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/feedtally/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/feedtally/` (~/.config/feedtally/)
//! - Data/Exports: `$XDG_DATA_HOME/feedtally/` (~/.local/share/feedtally/)
//! - State/Logs: `$XDG_STATE_HOME/feedtally/` (~/.local/state/feedtally/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "feedtally";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Collection loop defaults
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Feed surface settings
    #[serde(default)]
    pub feed: FeedConfig,

    /// Export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Collection loop defaults
///
/// These are the values a control surface starts with. Commands that carry
/// their own values are still clamped by the session.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Stop once this many records are stored
    #[serde(default = "default_max_count")]
    pub max_count: usize,

    /// Wait between scrolling and re-reading, in milliseconds
    #[serde(default = "default_step_wait_ms")]
    pub step_wait_ms: u64,

    /// Keep only posts written by the profile owner
    #[serde(default = "default_only_owner")]
    pub only_owner: bool,

    /// Hard cap on scroll steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Consecutive steps without a new record before giving up
    #[serde(default = "default_max_idle_steps")]
    pub max_idle_steps: u32,

    /// Fraction of the viewport height scrolled per step
    #[serde(default = "default_scroll_fraction")]
    pub scroll_fraction: f64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            step_wait_ms: default_step_wait_ms(),
            only_owner: default_only_owner(),
            max_steps: default_max_steps(),
            max_idle_steps: default_max_idle_steps(),
            scroll_fraction: default_scroll_fraction(),
        }
    }
}

fn default_max_count() -> usize {
    500
}

fn default_step_wait_ms() -> u64 {
    900
}

fn default_only_owner() -> bool {
    true
}

fn default_max_steps() -> u32 {
    2000
}

fn default_max_idle_steps() -> u32 {
    30
}

fn default_scroll_fraction() -> f64 {
    0.9
}

/// Feed surface settings
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Origin used to absolutize relative permalinks
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Viewport height reported by replayed snapshots, in pixels
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            viewport_height: default_viewport_height(),
        }
    }
}

fn default_base_url() -> String {
    crate::extract::record::DEFAULT_BASE_URL.to_string()
}

fn default_viewport_height() -> u32 {
    900
}

/// Export settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExportConfig {
    /// Directory CSV exports are written to (default: data dir `exports/`)
    pub dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let c = &self.collection;
        if !(c.scroll_fraction > 0.0 && c.scroll_fraction <= 1.0) {
            return Err(Error::Config(
                "collection.scroll_fraction must be in (0, 1]".to_string(),
            ));
        }
        if c.max_count == 0 {
            return Err(Error::Config(
                "collection.max_count must be at least 1".to_string(),
            ));
        }
        if c.max_steps == 0 || c.max_idle_steps == 0 {
            return Err(Error::Config(
                "collection.max_steps and collection.max_idle_steps must be at least 1"
                    .to_string(),
            ));
        }
        if self.feed.viewport_height == 0 {
            return Err(Error::Config(
                "feed.viewport_height must be at least 1".to_string(),
            ));
        }
        if url::Url::parse(&self.feed.base_url).is_err() {
            return Err(Error::Config(format!(
                "feed.base_url is not an absolute URL: {}",
                self.feed.base_url
            )));
        }
        Ok(())
    }

    /// Directory exports are written to, honoring `[export] dir`.
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("exports"))
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/feedtally/config.toml` (~/.config/feedtally/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join(APP_DIR).join("config.toml")
    }

    /// Returns the data directory path (for exports)
    ///
    /// `$XDG_DATA_HOME/feedtally/` (~/.local/share/feedtally/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join(APP_DIR)
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/feedtally/` (~/.local/state/feedtally/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/feedtally/feedtally.log` (~/.local/state/feedtally/feedtally.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("feedtally.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection.max_count, 500);
        assert_eq!(config.collection.step_wait_ms, 900);
        assert!(config.collection.only_owner);
        assert_eq!(config.collection.max_idle_steps, 30);
        assert_eq!(config.feed.base_url, "https://x.com");
        assert!(config.export.dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[collection]
max_count = 100
only_owner = false
scroll_fraction = 0.5

[feed]
base_url = "https://twitter.com"

[export]
dir = "/tmp/exports"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.collection.max_count, 100);
        assert!(!config.collection.only_owner);
        assert_eq!(config.collection.step_wait_ms, 900);
        assert_eq!(config.collection.scroll_fraction, 0.5);
        assert_eq!(config.feed.base_url, "https://twitter.com");
        assert_eq!(config.export_dir(), PathBuf::from("/tmp/exports"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.collection.scroll_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collection.scroll_fraction = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collection.max_idle_steps = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.feed.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[collection]\nmax_count = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));

        std::fs::write(&path, "[collection\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
