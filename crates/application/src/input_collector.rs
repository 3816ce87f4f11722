use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::debug;

use domain::common::error::RunnerError;
use domain::monitor::entity::{Input, Monitor};
use domain::monitor::run_result::InputRunResults;
use ports::secondary::cluster_port::{ClusterPort, SecurityContext};
use ports::secondary::script_port::TemplateEnginePort;

/// Executes a monitor's inputs for one period and converts each response
/// into a generic result map.
pub struct InputCollector {
    cluster: Arc<dyn ClusterPort>,
    templates: Arc<dyn TemplateEnginePort>,
}

impl InputCollector {
    pub fn new(cluster: Arc<dyn ClusterPort>, templates: Arc<dyn TemplateEnginePort>) -> Self {
        Self { cluster, templates }
    }

    /// Run every input in declaration order.
    ///
    /// Collection failures are captured in [`InputRunResults::error`] and
    /// flow into the triggers as an alert error. An unsupported input kind
    /// is a caller bug and propagates instead.
    pub async fn collect(
        &self,
        monitor: &Monitor,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        roles: &[String],
    ) -> Result<InputRunResults, RunnerError> {
        match self.try_collect(monitor, period_start, period_end, roles).await {
            Ok(results) => Ok(InputRunResults::new(results)),
            Err(error @ RunnerError::UnsupportedInput(_)) => Err(error),
            Err(error) => {
                debug!(monitor_id = %monitor.id, error = %error, "input collection failed");
                Ok(InputRunResults::failed(error.to_string()))
            }
        }
    }

    async fn try_collect(
        &self,
        monitor: &Monitor,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        roles: &[String],
    ) -> Result<Vec<Map<String, Value>>, RunnerError> {
        let params = json!({
            "period_start": period_start.timestamp_millis(),
            "period_end": period_end.timestamp_millis(),
        });
        let anomaly_detector = monitor.is_anomaly_detector_monitor();

        let mut results = Vec::with_capacity(monitor.inputs.len());
        for input in &monitor.inputs {
            let Input::Search(search) = input else {
                return Err(RunnerError::UnsupportedInput(input.kind().to_string()));
            };

            let rendered = self.templates.render(&search.query, &params)?;
            let mut source: Value = serde_json::from_str(&rendered).map_err(|e| {
                RunnerError::Script(format!("rendered query is not valid JSON: {e}"))
            })?;

            // Anomaly-result indices are system-protected: bypass the
            // injected context and scope results to the owner's roles via
            // an explicit filter instead.
            let security = if anomaly_detector {
                add_backend_roles_filter(&mut source, roles);
                SecurityContext::Stashed
            } else {
                SecurityContext::Injected {
                    monitor_id: monitor.id.clone(),
                    roles: roles.to_vec(),
                }
            };

            let response = self
                .cluster
                .search(&search.indices, None, &source, &security)
                .await?;
            results.push(response_to_map(response));
        }
        Ok(results)
    }
}

/// Wrap the rendered query so only documents tagged with one of the
/// owner's backend roles are visible.
fn add_backend_roles_filter(source: &mut Value, roles: &[String]) {
    let original = source
        .get("query")
        .cloned()
        .unwrap_or_else(|| json!({"match_all": {}}));
    source["query"] = json!({
        "bool": {
            "must": [original],
            "filter": [{"terms": {"user.backend_roles.keyword": roles}}],
        }
    });
}

fn response_to_map(response: Value) -> Map<String, Value> {
    match response {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("response".to_string(), other);
            map
        }
    }
}
