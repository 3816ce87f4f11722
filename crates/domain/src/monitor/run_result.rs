use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Aggregate outcome of one `run_monitor` invocation. Serialized as the
/// response body of the test/preview API, so field names are wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorRunResult {
    pub monitor_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub period_start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub period_end: DateTime<Utc>,
    /// Monitor-level failure: indices could not be ensured or current alerts
    /// could not be loaded. No alerts are written when this is set.
    pub error: Option<String>,
    pub input_results: InputRunResults,
    pub trigger_results: BTreeMap<String, TriggerRunResult>,
}

impl MonitorRunResult {
    pub fn new(monitor_name: String, period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Self {
            monitor_name,
            period_start,
            period_end,
            error: None,
            input_results: InputRunResults::default(),
            trigger_results: BTreeMap::new(),
        }
    }

    /// The monitor-scoped error that becomes an alert error for every
    /// trigger: a top-level failure wins over an input-collection failure.
    pub fn alert_error(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.input_results.error.clone())
    }
}

/// Results of executing every input of the monitor, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InputRunResults {
    pub results: Vec<Map<String, Value>>,
    pub error: Option<String>,
}

impl InputRunResults {
    pub fn new(results: Vec<Map<String, Value>>) -> Self {
        Self {
            results,
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            results: Vec::new(),
            error: Some(error),
        }
    }
}

/// Outcome of evaluating one trigger and dispatching its actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerRunResult {
    pub name: String,
    pub triggered: bool,
    /// Condition failure. A failed script forces `triggered = true` so the
    /// problem surfaces as an error alert.
    pub error: Option<String>,
    pub action_results: BTreeMap<String, ActionRunResult>,
}

impl TriggerRunResult {
    pub fn new(name: String, triggered: bool, error: Option<String>) -> Self {
        Self {
            name,
            triggered,
            error,
            action_results: BTreeMap::new(),
        }
    }
}

/// Outcome of one action dispatch. Action failures stay here; they never
/// escalate into alert errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRunResult {
    pub action_id: String,
    pub action_name: String,
    /// Rendered `subject`/`message` plus the destination's `message_id`.
    pub output: BTreeMap<String, String>,
    pub throttled: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub execution_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ActionRunResult {
    /// Result for an action suppressed by its throttle window. Not an
    /// error, but fed to the composer to bump the throttle counter.
    pub fn throttled(action_id: String, action_name: String) -> Self {
        Self {
            action_id,
            action_name,
            output: BTreeMap::new(),
            throttled: true,
            execution_time: None,
            error: None,
        }
    }
}
