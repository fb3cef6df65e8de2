//! Configuration management for WebPilot
//!
//! Loads and saves the pilot's parameters from `~/.webpilot/config.json`,
//! with environment-variable overrides applied on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod paths;

pub use paths::{config_path, data_dir, profile_dir};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG IO ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG PARSE FAILED: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CONFIG NOT FOUND: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Decision oracle (chat-completions endpoint) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

/// Control loop tuning
///
/// Durations are stored as integer milliseconds/seconds so the file stays
/// human-editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
    #[serde(default = "default_loop_threshold")]
    pub loop_threshold: usize,
    #[serde(default = "default_iteration_pause_ms")]
    pub iteration_pause_ms: u64,
    #[serde(default = "default_wait_pause_ms")]
    pub wait_pause_ms: u64,
    #[serde(default = "default_wait_selector_timeout_s")]
    pub wait_selector_timeout_s: u64,
    #[serde(default = "default_sensor_retries")]
    pub sensor_retries: u32,
    #[serde(default = "default_sensor_retry_pause_ms")]
    pub sensor_retry_pause_ms: u64,
    #[serde(default = "default_task_timeout_s")]
    pub task_timeout_s: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_errors: default_max_errors(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            history_window: default_history_window(),
            loop_window: default_loop_window(),
            loop_threshold: default_loop_threshold(),
            iteration_pause_ms: default_iteration_pause_ms(),
            wait_pause_ms: default_wait_pause_ms(),
            wait_selector_timeout_s: default_wait_selector_timeout_s(),
            sensor_retries: default_sensor_retries(),
            sensor_retry_pause_ms: default_sensor_retry_pause_ms(),
            task_timeout_s: default_task_timeout_s(),
        }
    }
}

fn default_max_iterations() -> u32 {
    50
}

fn default_max_errors() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_history_window() -> usize {
    7
}

fn default_loop_window() -> usize {
    5
}

fn default_loop_threshold() -> usize {
    3
}

fn default_iteration_pause_ms() -> u64 {
    1_000
}

fn default_wait_pause_ms() -> u64 {
    2_000
}

fn default_wait_selector_timeout_s() -> u64 {
    10
}

fn default_sensor_retries() -> u32 {
    3
}

fn default_sensor_retry_pause_ms() -> u64 {
    1_000
}

fn default_task_timeout_s() -> u64 {
    15 * 60
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_user_data_dir")]
    pub user_data_dir: String,
    #[serde(default = "default_start_url")]
    pub start_url: String,
    #[serde(default)]
    pub keep_open: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            user_data_dir: default_user_data_dir(),
            start_url: default_start_url(),
            keep_open: false,
        }
    }
}

fn default_user_data_dir() -> String {
    "~/.webpilot/profile".to_string()
}

fn default_start_url() -> String {
    "https://www.google.com".to_string()
}

/// Background session keep-alive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_keepalive_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_probe_timeout_s")]
    pub probe_timeout_s: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: default_keepalive_interval_s(),
            probe_timeout_s: default_probe_timeout_s(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_keepalive_interval_s() -> u64 {
    30
}

fn default_probe_timeout_s() -> u64 {
    5
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub keepalive: KeepAliveConfig,
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("◆ no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("◆ reading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("◆ writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (empty values are ignored)
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.oracle.api_key = key;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.oracle.model = model;
        }
        if let Some(base) = get("OPENAI_API_BASE") {
            self.oracle.api_base = Some(base);
        }
        if let Some(dir) = get("BROWSER_USER_DATA_DIR") {
            self.browser.user_data_dir = dir;
        }
        if let Some(url) = get("START_URL") {
            self.browser.start_url = url;
        }
        if let Some(keep) = get("KEEP_BROWSER_OPEN") {
            self.browser.keep_open = keep.eq_ignore_ascii_case("true");
        }
    }

    /// Browser profile directory with `~` expanded
    pub fn user_data_dir(&self) -> PathBuf {
        expand_home(&self.browser.user_data_dir)
    }

    /// Oracle API key, if configured
    pub fn api_key(&self) -> Option<String> {
        let key = self.oracle.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }

    /// Oracle API base URL, if overridden
    pub fn api_base(&self) -> Option<String> {
        self.oracle
            .api_base
            .as_ref()
            .filter(|b| !b.is_empty())
            .cloned()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Write a default config (if missing) and create the browser profile directory
pub async fn init() -> Result<Config> {
    let config_path = config_path();

    if config_path.exists() {
        warn!("◆ config already exists at {:?}", config_path);
    } else {
        let config = Config::default();
        config.save().await?;
        info!("◆ config written to {:?}", config_path);
    }

    let config = Config::load().await?;
    let profile = config.user_data_dir();
    tokio::fs::create_dir_all(&profile).await?;
    info!("◆ browser profile ready at {:?}", profile);

    Ok(config)
}
