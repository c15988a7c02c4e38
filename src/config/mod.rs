use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::session::TimeoutSettings;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Minutes before expiry at which the "expiring soon" warning is shown (default: 5)
    #[serde(default = "default_warning_time_minutes")]
    pub warning_time_minutes: u64,
    /// Seconds between expiry checks (default: 60)
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    /// Minutes before expiry at which the session is silently renewed (default: 10)
    #[serde(default = "default_renewal_threshold_minutes")]
    pub renewal_threshold_minutes: u64,
    /// Minutes without activity before a forced logout (default: 30)
    #[serde(default = "default_max_idle_minutes")]
    pub max_idle_minutes: u64,
    /// Seconds between idle checks (default: 30)
    #[serde(default = "default_idle_check_interval_seconds")]
    pub idle_check_interval_seconds: u64,
    /// Minutes before expiry at which the scheduled renewal fires (default: 10)
    #[serde(default = "default_renewal_lead_minutes")]
    pub renewal_lead_minutes: u64,
    /// Path the user is sent to after a forced logout
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warning_time_minutes: default_warning_time_minutes(),
            check_interval_seconds: default_check_interval_seconds(),
            renewal_threshold_minutes: default_renewal_threshold_minutes(),
            max_idle_minutes: default_max_idle_minutes(),
            idle_check_interval_seconds: default_idle_check_interval_seconds(),
            renewal_lead_minutes: default_renewal_lead_minutes(),
            login_path: default_login_path(),
        }
    }
}

impl SessionConfig {
    pub fn timeout_settings(&self) -> TimeoutSettings {
        TimeoutSettings {
            warning_time: Duration::from_secs(self.warning_time_minutes * 60),
            check_interval: Duration::from_secs(self.check_interval_seconds),
            renewal_threshold: Duration::from_secs(self.renewal_threshold_minutes * 60),
            max_idle_time: Duration::from_secs(self.max_idle_minutes * 60),
            idle_check_interval: Duration::from_secs(self.idle_check_interval_seconds),
            renewal_lead: Duration::from_secs(self.renewal_lead_minutes * 60),
            login_path: self.login_path.clone(),
        }
    }
}

fn default_warning_time_minutes() -> u64 {
    5
}

fn default_check_interval_seconds() -> u64 {
    60
}

fn default_renewal_threshold_minutes() -> u64 {
    10
}

fn default_max_idle_minutes() -> u64 {
    30
}

fn default_idle_check_interval_seconds() -> u64 {
    30
}

fn default_renewal_lead_minutes() -> u64 {
    10
}

fn default_login_path() -> String {
    "/login".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    /// Timeout for auth API requests in seconds (default: 10)
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_refresh_path() -> String {
    "/api/auth/refresh".to_string()
}

fn default_logout_path() -> String {
    "/api/auth/logout".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Mirror activity state to disk so it survives restarts
    #[serde(default = "default_storage_enabled")]
    pub enabled: bool,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_storage_enabled(),
            path: default_storage_path(),
        }
    }
}

fn default_storage_enabled() -> bool {
    true
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/session.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            config.validate()?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.warning_time_minutes == 0 {
            anyhow::bail!("session.warning_time_minutes must be greater than 0");
        }
        if session.check_interval_seconds == 0 {
            anyhow::bail!("session.check_interval_seconds must be greater than 0");
        }
        if session.idle_check_interval_seconds == 0 {
            anyhow::bail!("session.idle_check_interval_seconds must be greater than 0");
        }
        if session.max_idle_minutes == 0 {
            anyhow::bail!("session.max_idle_minutes must be greater than 0");
        }
        if !session.login_path.starts_with('/') {
            anyhow::bail!("session.login_path must be an absolute path");
        }
        if self.auth.request_timeout_seconds == 0 {
            anyhow::bail!("auth.request_timeout_seconds must be greater than 0");
        }
        Ok(())
    }
}
