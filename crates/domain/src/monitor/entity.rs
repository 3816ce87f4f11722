use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Sentinel id carried by monitors that were never persisted (test/preview
/// executions). Runs against such monitors must not write alerts.
pub const NO_ID: &str = "_na_";

/// Role granted to runs of monitors created before per-user ownership
/// existed. Such monitors have no owning user attached.
pub const LEGACY_ADMIN_ROLE: &str = "all_access";

/// Index pattern prefix that marks a monitor as querying anomaly-detection
/// results. Those indices are system-protected, so their inputs run under a
/// stashed security context with an owner-role filter instead.
pub const ANOMALY_RESULT_INDEX_PREFIX: &str = ".anomaly-results";

/// A scheduled definition combining inputs, triggers, and actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// Owning user; `None` for monitors predating per-user ownership.
    #[serde(default)]
    pub user: Option<MonitorUser>,
    pub inputs: Vec<Input>,
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub schema_version: i64,
}

impl Monitor {
    /// Backend roles the monitor's searches execute under.
    pub fn run_roles(&self) -> Vec<String> {
        match &self.user {
            Some(user) => user.backend_roles.clone(),
            None => vec![LEGACY_ADMIN_ROLE.to_string()],
        }
    }

    /// Whether any input targets anomaly-detection result indices.
    pub fn is_anomaly_detector_monitor(&self) -> bool {
        self.inputs.iter().any(|input| match input {
            Input::Search(search) => search
                .indices
                .iter()
                .any(|index| index.starts_with(ANOMALY_RESULT_INDEX_PREFIX)),
            Input::ClusterMetrics { .. } => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorUser {
    pub name: String,
    #[serde(default)]
    pub backend_roles: Vec<String>,
}

/// A monitor input. Only search inputs are executed by this runner; other
/// kinds are rejected at collection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Input {
    Search(SearchInput),
    /// Health-style input served by a different runner.
    ClusterMetrics { path: String },
}

impl Input {
    pub fn kind(&self) -> &'static str {
        match self {
            Input::Search(_) => "search",
            Input::ClusterMetrics { .. } => "cluster_metrics",
        }
    }
}

/// A query template executed against a set of index patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInput {
    pub indices: Vec<String>,
    /// JSON search source with `{{period_start}}`/`{{period_end}}`
    /// placeholders, rendered by the template engine before execution.
    pub query: Script,
}

/// An inline script: a boolean trigger condition or a message template.
/// Opaque to the runner; compiled and executed by the script-engine port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub lang: String,
    pub source: String,
}

impl Script {
    pub fn mustache(source: impl Into<String>) -> Self {
        Self {
            lang: "mustache".to_string(),
            source: source.into(),
        }
    }

    pub fn painless(source: impl Into<String>) -> Self {
        Self {
            lang: "painless".to_string(),
            source: source.into(),
        }
    }
}

/// A boolean condition over input results plus the actions to take when it
/// fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub name: String,
    pub severity: String,
    pub condition: Script,
    pub actions: Vec<Action>,
}

/// A rendered message delivery to one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    pub destination_id: String,
    #[serde(default)]
    pub subject_template: Option<Script>,
    pub message_template: Script,
    #[serde(default)]
    pub throttle: Option<Throttle>,
}

/// Time-based suppression of repeated dispatches of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Throttle {
    pub value: i64,
    pub unit: ThrottleUnit,
    pub enabled: bool,
}

impl Throttle {
    /// The suppression window as a duration.
    pub fn window(&self) -> Duration {
        match self.unit {
            ThrottleUnit::Minutes => Duration::minutes(self.value),
            ThrottleUnit::Hours => Duration::hours(self.value),
            ThrottleUnit::Days => Duration::days(self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThrottleUnit {
    Minutes,
    Hours,
    Days,
}

/// A parsed scheduled-job document as handed over by the job scheduler.
/// The scheduled-job index is shared between plugins, so kinds other than
/// `Monitor` can reach the runner and must be rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduledJob {
    Monitor(Monitor),
    /// A job owned by another plugin sharing the scheduled-job index.
    Foreign { id: String, job_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_monitor(indices: Vec<&str>) -> Monitor {
        Monitor {
            id: "m1".to_string(),
            name: "cpu watcher".to_string(),
            enabled: true,
            user: None,
            inputs: vec![Input::Search(SearchInput {
                indices: indices.into_iter().map(String::from).collect(),
                query: Script::mustache(r#"{"query":{"match_all":{}}}"#),
            })],
            triggers: Vec::new(),
            schema_version: 1,
        }
    }

    #[test]
    fn run_roles_fall_back_to_legacy_admin() {
        let monitor = search_monitor(vec!["logs-*"]);
        assert_eq!(monitor.run_roles(), vec![LEGACY_ADMIN_ROLE.to_string()]);
    }

    #[test]
    fn run_roles_use_owner_backend_roles() {
        let mut monitor = search_monitor(vec!["logs-*"]);
        monitor.user = Some(MonitorUser {
            name: "kirk".to_string(),
            backend_roles: vec!["ops".to_string(), "sre".to_string()],
        });
        assert_eq!(monitor.run_roles(), vec!["ops", "sre"]);
    }

    #[test]
    fn anomaly_detector_monitor_detected_by_index_prefix() {
        assert!(search_monitor(vec![".anomaly-results-ad1"]).is_anomaly_detector_monitor());
        assert!(search_monitor(vec!["logs-*", ".anomaly-results*"]).is_anomaly_detector_monitor());
        assert!(!search_monitor(vec!["logs-*"]).is_anomaly_detector_monitor());
    }

    #[test]
    fn throttle_window_per_unit() {
        let throttle = Throttle {
            value: 10,
            unit: ThrottleUnit::Minutes,
            enabled: true,
        };
        assert_eq!(throttle.window(), Duration::minutes(10));

        let throttle = Throttle {
            value: 2,
            unit: ThrottleUnit::Days,
            enabled: true,
        };
        assert_eq!(throttle.window(), Duration::days(2));
    }

    #[test]
    fn scheduled_job_round_trips_through_json() {
        let job = ScheduledJob::Monitor(search_monitor(vec!["logs-*"]));
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains(r#""type":"monitor""#), "got: {json}");
        let parsed: ScheduledJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn input_kind_labels() {
        let search = Input::Search(SearchInput {
            indices: vec!["logs-*".to_string()],
            query: Script::mustache("{}"),
        });
        assert_eq!(search.kind(), "search");
        let metrics = Input::ClusterMetrics {
            path: "_cluster/health".to_string(),
        };
        assert_eq!(metrics.kind(), "cluster_metrics");
    }
}
