use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::entity::{Monitor, NO_ID, Trigger};

/// Index holding the current (non-terminal) alerts, routed by monitor id.
pub const ALERT_INDEX: &str = ".watchtower-alerts";

/// Write alias of the rolling history indices. Receives COMPLETED alerts
/// (when history is enabled) and alerts moved off stale monitor
/// definitions; the runner never reads it.
pub const HISTORY_WRITE_INDEX: &str = ".watchtower-alert-history-write";

/// Version stamped into every alert document written by this runner.
/// Bumped together with the alert index mapping.
pub const ALERT_SCHEMA_VERSION: i64 = 3;

/// Upper bound on retained error-history entries per alert, newest first.
pub const MAX_ERROR_HISTORY: usize = 10;

/// Durable record of a trigger's firing state, persisted across runs.
///
/// Identity across runs is the `(monitor_id, trigger_id)` pair; the document
/// id is cluster-assigned on first insert and carried outside the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Cluster-assigned document id; [`NO_ID`] until the first save.
    #[serde(skip, default = "unsaved_id")]
    pub id: String,
    pub schema_version: i64,
    pub monitor_id: String,
    pub monitor_name: String,
    pub trigger_id: String,
    pub trigger_name: String,
    pub severity: String,
    pub state: AlertState,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_notification_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub acknowledged_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Newest-first, capped at [`MAX_ERROR_HISTORY`] entries.
    #[serde(default)]
    pub error_history: Vec<ErrorHistoryEntry>,
    #[serde(default)]
    pub action_execution_results: Vec<ActionExecutionResult>,
}

fn unsaved_id() -> String {
    NO_ID.to_string()
}

impl Alert {
    /// A fresh alert for a trigger firing (or erroring) for the first time.
    pub fn new(
        monitor: &Monitor,
        trigger: &Trigger,
        state: AlertState,
        start_time: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: unsaved_id(),
            schema_version: ALERT_SCHEMA_VERSION,
            monitor_id: monitor.id.clone(),
            monitor_name: monitor.name.clone(),
            trigger_id: trigger.id.clone(),
            trigger_name: trigger.name.clone(),
            severity: trigger.severity.clone(),
            state,
            start_time,
            last_notification_time: Some(start_time),
            acknowledged_time: None,
            end_time: None,
            error_message,
            error_history: Vec::new(),
            action_execution_results: Vec::new(),
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.state == AlertState::Acknowledged
    }
}

/// Alert lifecycle states as stored in the alert indices.
///
/// ACKNOWLEDGED is set by users out-of-band; DELETED marks alerts moved to
/// history after their trigger disappeared. The runner's save path never
/// produces either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertState {
    Active,
    Acknowledged,
    Completed,
    Error,
    Deleted,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Active => "ACTIVE",
            AlertState::Acknowledged => "ACKNOWLEDGED",
            AlertState::Completed => "COMPLETED",
            AlertState::Error => "ERROR",
            AlertState::Deleted => "DELETED",
        }
    }
}

/// One retained failure of a monitor or trigger run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHistoryEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Per-action dispatch bookkeeping carried on the alert, used for
/// throttling decisions on later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionResult {
    pub action_id: String,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_execution_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub throttled_count: i32,
}
