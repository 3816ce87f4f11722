//! Hot-reloadable runner settings.
//!
//! One immutable snapshot struct; the holder swaps whole snapshots
//! atomically and readers take one snapshot per use, so in-flight work
//! keeps the values it started with.

use serde::{Deserialize, Serialize};

use crate::destination::entity::DestinationType;

/// Snapshot of every hot-reloadable knob the runner reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSettings {
    /// Constant backoff between alert-save bulk retries.
    pub alert_backoff_millis: u64,
    /// Total bulk submission attempts for one save.
    pub alert_backoff_count: usize,
    /// Initial delay of the exponential alert-move backoff.
    pub move_alerts_backoff_millis: u64,
    /// Total attempts for one alert move.
    pub move_alerts_backoff_count: usize,
    /// Whether COMPLETED alerts are copied into the history write index.
    pub alert_history_enabled: bool,
    /// Destination types actions are allowed to publish to.
    pub destination_allow_list: Vec<String>,
    /// Hosts no publish may ever reach.
    pub destination_host_deny_list: Vec<String>,
    pub aws_sns: AwsSnsSettings,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            alert_backoff_millis: 50,
            alert_backoff_count: 3,
            move_alerts_backoff_millis: 250,
            move_alerts_backoff_count: 5,
            alert_history_enabled: true,
            destination_allow_list: DestinationType::ALL
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            destination_host_deny_list: Vec::new(),
            aws_sns: AwsSnsSettings::default(),
        }
    }
}

impl RunnerSettings {
    pub fn destination_allowed(&self, dest_type: DestinationType) -> bool {
        self.destination_allow_list
            .iter()
            .any(|allowed| allowed == dest_type.as_str())
    }
}

/// SNS credential mode, part of the settings snapshot (never process-global
/// state) so a reload cannot change it under an in-flight publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsSnsSettings {
    /// Static-credential mode: sign with the configured key pair instead of
    /// assuming the destination's IAM role.
    pub enabled: bool,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl AwsSnsSettings {
    /// Key under which a per-role SNS client is cached.
    ///
    /// Insertion and lookup both use this derivation: the key pair in
    /// static-credential mode, the role ARN otherwise.
    pub fn client_cache_key(&self, role_arn: &str) -> String {
        match self.static_credentials() {
            Some((access_key, secret_key)) => format!("{access_key}|{secret_key}"),
            None => role_arn.to_string(),
        }
    }

    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        if !self.enabled {
            return None;
        }
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access_key), Some(secret_key)) => Some((access_key, secret_key)),
            _ => None,
        }
    }
}

/// Secure destination material loaded from the keystore, snapshotted the
/// same way as [`RunnerSettings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecureDestinationSettings {
    pub email_username: Option<String>,
    pub email_password: Option<String>,
}
