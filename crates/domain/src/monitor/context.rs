use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::alert::entity::Alert;
use crate::monitor::entity::{Monitor, Trigger};
use crate::monitor::run_result::MonitorRunResult;

/// Everything a trigger condition (and the action templates under it) can
/// see for one evaluation: the monitor, the trigger, this period's input
/// results, and the previous alert if one is live.
#[derive(Debug, Clone)]
pub struct TriggerExecutionContext<'a> {
    pub monitor: &'a Monitor,
    pub trigger: &'a Trigger,
    pub results: &'a [Map<String, Value>],
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub alert: Option<&'a Alert>,
    /// Monitor-scoped error (top-level or input collection) carried into
    /// the evaluation.
    pub error: Option<String>,
}

impl<'a> TriggerExecutionContext<'a> {
    pub fn new(
        monitor: &'a Monitor,
        trigger: &'a Trigger,
        monitor_result: &'a MonitorRunResult,
        alert: Option<&'a Alert>,
    ) -> Self {
        Self {
            monitor,
            trigger,
            results: &monitor_result.input_results.results,
            period_start: monitor_result.period_start,
            period_end: monitor_result.period_end,
            alert,
            error: monitor_result.alert_error(),
        }
    }

    /// The `ctx` value scripts and templates are rendered against.
    pub fn as_template_arg(&self) -> Value {
        json!({
            "monitor": {
                "id": self.monitor.id,
                "name": self.monitor.name,
                "enabled": self.monitor.enabled,
            },
            "trigger": {
                "id": self.trigger.id,
                "name": self.trigger.name,
                "severity": self.trigger.severity,
            },
            "results": self.results,
            "period_start": self.period_start.timestamp_millis(),
            "period_end": self.period_end.timestamp_millis(),
            "alert": self.alert.map(|alert| json!({
                "id": alert.id,
                "state": alert.state,
                "error_message": alert.error_message,
                "acknowledged_time": alert.acknowledged_time.map(|t| t.timestamp_millis()),
                "last_notification_time": alert.last_notification_time.map(|t| t.timestamp_millis()),
            })),
            "error": self.error,
        })
    }
}
