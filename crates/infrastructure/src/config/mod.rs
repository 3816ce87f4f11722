//! Runner configuration: structs, YAML parsing, and validation.
//!
//! The `runner` section maps the subsystem's dotted setting names onto YAML
//! keys (`alert.backoff.millis` → `runner.alert_backoff_millis`, and so on).
//! Parsing is phase one; [`RunnerConfig::validate`] is phase two — a reload
//! that fails either phase keeps the current snapshot.

use std::path::Path;

use serde::{Deserialize, Serialize};

use domain::destination::entity::DestinationType;
use domain::settings::{AwsSnsSettings, RunnerSettings};

use crate::constants::DEFAULT_CLUSTER_ENDPOINT;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("invalid value '{value}' for field '{field}': expected one of {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
}

impl From<serde_yaml_ng::Error> for ConfigError {
    fn from(error: serde_yaml_ng::Error) -> Self {
        ConfigError::Yaml(error.to_string())
    }
}

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        warn_if_world_readable(path);
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.endpoint.is_empty() {
            return Err(ConfigError::Validation {
                field: "cluster.endpoint".to_string(),
                message: "endpoint must not be empty".to_string(),
            });
        }

        if self.runner.alert_backoff_count == 0 {
            return Err(ConfigError::Validation {
                field: "runner.alert_backoff_count".to_string(),
                message: "attempt budget must be positive".to_string(),
            });
        }
        if self.runner.move_alerts_backoff_count == 0 {
            return Err(ConfigError::Validation {
                field: "runner.move_alerts_backoff_count".to_string(),
                message: "attempt budget must be positive".to_string(),
            });
        }

        for entry in &self.runner.destination_allow_list {
            if !DestinationType::ALL.iter().any(|t| t.as_str() == entry) {
                return Err(ConfigError::InvalidValue {
                    field: "runner.destination_allow_list".to_string(),
                    value: entry.clone(),
                    expected: "slack, chime, custom_webhook, email, sns, test_action".to_string(),
                });
            }
        }

        if self.runner.sns.enabled
            && (self.runner.sns.access_key.is_none() || self.runner.sns.secret_key.is_none())
        {
            return Err(ConfigError::Validation {
                field: "runner.sns".to_string(),
                message: "static-credential mode requires access_key and secret_key".to_string(),
            });
        }

        Ok(())
    }

    /// The hot-reloadable snapshot handed to the runner.
    pub fn to_settings(&self) -> RunnerSettings {
        RunnerSettings {
            alert_backoff_millis: self.runner.alert_backoff_millis,
            alert_backoff_count: self.runner.alert_backoff_count,
            move_alerts_backoff_millis: self.runner.move_alerts_backoff_millis,
            move_alerts_backoff_count: self.runner.move_alerts_backoff_count,
            alert_history_enabled: self.runner.alert_history_enabled,
            destination_allow_list: self.runner.destination_allow_list.clone(),
            destination_host_deny_list: self.runner.destination_host_deny_list.clone(),
            aws_sns: AwsSnsSettings {
                enabled: self.runner.sns.enabled,
                access_key: self.runner.sns.access_key.clone(),
                secret_key: self.runner.sns.secret_key.clone(),
            },
        }
    }
}

/// The config file can carry cluster and SMTP credentials.
#[cfg(unix)]
fn warn_if_world_readable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = std::fs::metadata(path)
        && metadata.permissions().mode() & 0o004 != 0
    {
        tracing::warn!(
            path = %path.display(),
            "config file is world-readable and may contain credentials"
        );
    }
}

#[cfg(not(unix))]
fn warn_if_world_readable(_path: &Path) {}

// ── Sections ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            username: None,
            password: None,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_CLUSTER_ENDPOINT.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    #[serde(default = "default_alert_backoff_millis")]
    pub alert_backoff_millis: u64,
    #[serde(default = "default_alert_backoff_count")]
    pub alert_backoff_count: usize,
    #[serde(default = "default_move_backoff_millis")]
    pub move_alerts_backoff_millis: u64,
    #[serde(default = "default_move_backoff_count")]
    pub move_alerts_backoff_count: usize,
    #[serde(default = "default_true")]
    pub alert_history_enabled: bool,
    #[serde(default = "default_allow_list")]
    pub destination_allow_list: Vec<String>,
    #[serde(default)]
    pub destination_host_deny_list: Vec<String>,
    #[serde(default)]
    pub sns: SnsSection,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            alert_backoff_millis: default_alert_backoff_millis(),
            alert_backoff_count: default_alert_backoff_count(),
            move_alerts_backoff_millis: default_move_backoff_millis(),
            move_alerts_backoff_count: default_move_backoff_count(),
            alert_history_enabled: true,
            destination_allow_list: default_allow_list(),
            destination_host_deny_list: Vec::new(),
            sns: SnsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnsSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

fn default_alert_backoff_millis() -> u64 {
    50
}
fn default_alert_backoff_count() -> usize {
    3
}
fn default_move_backoff_millis() -> u64 {
    250
}
fn default_move_backoff_count() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_allow_list() -> Vec<String> {
    DestinationType::ALL
        .iter()
        .map(|t| t.as_str().to_string())
        .collect()
}

// ── Logging ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Text,
}
