use std::collections::HashMap;
use std::slice;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use domain::alert::entity::{ALERT_INDEX, Alert, AlertState, HISTORY_WRITE_INDEX};
use domain::common::error::{RunnerError, STATUS_TOO_MANY_REQUESTS};
use domain::monitor::entity::{Monitor, NO_ID};
use ports::secondary::cluster_port::{BulkOp, ClusterPort, SecurityContext};
use ports::secondary::metrics_port::MetricsPort;

use crate::retry::retry;
use crate::settings::{SettingsHandle, alert_save_policy, move_alerts_policy};

/// Read/write gateway to the two alert indices.
///
/// Writes are routed by monitor id and carry no version checks: the runner
/// wins write races against user acknowledgements, and a lost ack is cheap
/// to redo from the user side.
pub struct AlertStore {
    cluster: Arc<dyn ClusterPort>,
    settings: SettingsHandle,
    metrics: Arc<dyn MetricsPort>,
    alert_index: String,
    history_write_index: String,
}

impl AlertStore {
    pub fn new(
        cluster: Arc<dyn ClusterPort>,
        settings: SettingsHandle,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            cluster,
            settings,
            metrics,
            alert_index: ALERT_INDEX.to_string(),
            history_write_index: HISTORY_WRITE_INDEX.to_string(),
        }
    }

    /// Override the target indices (tests, multi-tenant deployments).
    #[must_use]
    pub fn with_indices(mut self, alert_index: String, history_write_index: String) -> Self {
        self.alert_index = alert_index;
        self.history_write_index = history_write_index;
        self
    }

    /// Make sure both alert indices exist before a run touches them.
    pub async fn ensure_indices(&self) -> Result<(), RunnerError> {
        for index in [&self.alert_index, &self.history_write_index] {
            if !self.cluster.index_exists(index).await? {
                self.cluster.create_index(index, &alert_index_body()).await?;
            }
        }
        Ok(())
    }

    /// Load the live alert per trigger of `monitor`, keyed by trigger id.
    ///
    /// Every trigger gets an entry; triggers without a live alert map to
    /// `None`. More than one live alert per trigger violates the identity
    /// invariant: it is logged and the first one is used.
    pub async fn load_current_alerts(
        &self,
        monitor: &Monitor,
    ) -> Result<HashMap<String, Option<Alert>>, RunnerError> {
        let source = json!({
            "size": monitor.triggers.len() * 2,
            "query": {"term": {"monitor_id": monitor.id}},
        });
        let response = self
            .cluster
            .search(
                slice::from_ref(&self.alert_index),
                Some(&monitor.id),
                &source,
                &SecurityContext::Stashed,
            )
            .await?;
        raise_on_shard_failures(&response)?;

        let mut grouped: HashMap<String, Vec<Alert>> = HashMap::new();
        for hit in response["hits"]["hits"].as_array().into_iter().flatten() {
            let alert = parse_alert_hit(hit)?;
            grouped.entry(alert.trigger_id.clone()).or_default().push(alert);
        }

        let mut current = HashMap::with_capacity(monitor.triggers.len());
        for trigger in &monitor.triggers {
            let mut alerts = grouped.remove(&trigger.id).unwrap_or_default();
            if alerts.len() > 1 {
                warn!(
                    monitor_id = %monitor.id,
                    trigger_id = %trigger.id,
                    count = alerts.len(),
                    "multiple live alerts for one trigger, using the first"
                );
            }
            current.insert(trigger.id.clone(), alerts.drain(..).next());
        }
        Ok(current)
    }

    /// Persist the run's updated alerts as one routed bulk write.
    ///
    /// ACTIVE/ERROR index into the alert index, COMPLETED delete from it
    /// (plus a history copy when enabled). Backpressured items are
    /// resubmitted under the constant policy; the first rejection's cause
    /// is raised once the attempt budget runs out. Other item failures are
    /// not retriable and only logged.
    pub async fn save(&self, alerts: &[Alert]) -> Result<(), RunnerError> {
        if alerts.is_empty() {
            return Ok(());
        }
        let settings = self.settings.snapshot();

        let mut ops = Vec::new();
        for alert in alerts {
            let source = alert_source(alert)?;
            match alert.state {
                AlertState::Active | AlertState::Error => ops.push(BulkOp::Index {
                    index: self.alert_index.clone(),
                    id: doc_id(alert),
                    routing: alert.monitor_id.clone(),
                    source,
                }),
                AlertState::Completed => {
                    ops.push(BulkOp::Delete {
                        index: self.alert_index.clone(),
                        id: alert.id.clone(),
                        routing: alert.monitor_id.clone(),
                    });
                    if settings.alert_history_enabled {
                        ops.push(BulkOp::Index {
                            index: self.history_write_index.clone(),
                            id: Some(alert.id.clone()),
                            routing: alert.monitor_id.clone(),
                            source,
                        });
                    }
                }
                AlertState::Acknowledged | AlertState::Deleted => {
                    return Err(RunnerError::IllegalAlertState {
                        state: alert.state.as_str().to_string(),
                        trigger_id: alert.trigger_id.clone(),
                    });
                }
            }
            self.metrics.record_alert_write(alert.state.as_str());
        }

        let policy = alert_save_policy(&settings);
        let mut pending = ops;
        let mut attempt = 1;
        loop {
            let results = self.cluster.bulk(&pending).await?;
            let mut resubmit = Vec::new();
            let mut first_cause: Option<String> = None;
            for (op, item) in pending.iter().zip(&results) {
                if item.is_too_many_requests() {
                    if first_cause.is_none() {
                        first_cause = Some(
                            item.error
                                .clone()
                                .unwrap_or_else(|| "too many requests".to_string()),
                        );
                    }
                    resubmit.push(op.clone());
                } else if item.is_failed() {
                    warn!(
                        doc_id = %item.id,
                        status = item.status,
                        error = item.error.as_deref().unwrap_or("unknown"),
                        "non-retriable alert write failure"
                    );
                }
            }

            let Some(cause) = first_cause else {
                return Ok(());
            };
            if attempt >= policy.max_attempts {
                return Err(RunnerError::ClusterStatus {
                    status: STATUS_TOO_MANY_REQUESTS,
                    message: cause,
                });
            }
            self.metrics.record_bulk_retry();
            tokio::time::sleep(policy.delay_for(attempt - 1)).await;
            pending = resubmit;
            attempt += 1;
        }
    }

    /// Move alerts owned by a stale monitor definition into history.
    ///
    /// Copies every live alert whose trigger no longer exists (all alerts
    /// when the monitor was deleted) into the history index with state
    /// DELETED, then removes the successfully-copied ones from the alert
    /// index. Runs under the exponential policy.
    pub async fn move_alerts(
        &self,
        monitor_id: &str,
        new_monitor: Option<&Monitor>,
    ) -> Result<(), RunnerError> {
        let policy = move_alerts_policy(&self.settings.snapshot());
        retry(policy, |_| true, || {
            self.move_alerts_once(monitor_id, new_monitor)
        })
        .await
    }

    async fn move_alerts_once(
        &self,
        monitor_id: &str,
        new_monitor: Option<&Monitor>,
    ) -> Result<(), RunnerError> {
        let mut query = json!({
            "bool": {"filter": [{"term": {"monitor_id": monitor_id}}]},
        });
        if let Some(monitor) = new_monitor {
            let surviving: Vec<&str> = monitor.triggers.iter().map(|t| t.id.as_str()).collect();
            query["bool"]["must_not"] = json!([{"terms": {"trigger_id": surviving}}]);
        }
        let source = json!({"query": query, "size": 1000});

        let response = self
            .cluster
            .search(
                slice::from_ref(&self.alert_index),
                Some(monitor_id),
                &source,
                &SecurityContext::Stashed,
            )
            .await?;
        let hits = response["hits"]["hits"].as_array().cloned().unwrap_or_default();
        if hits.is_empty() {
            return Ok(());
        }

        let mut copy_ops = Vec::with_capacity(hits.len());
        for hit in &hits {
            let mut alert = parse_alert_hit(hit)?;
            alert.state = AlertState::Deleted;
            copy_ops.push(BulkOp::Index {
                index: self.history_write_index.clone(),
                id: Some(alert.id.clone()),
                routing: monitor_id.to_string(),
                source: alert_source(&alert)?,
            });
        }

        let copy_results = self.cluster.bulk(&copy_ops).await?;
        let mut copy_failures = Vec::new();
        let mut delete_ops = Vec::new();
        for item in &copy_results {
            if item.is_failed() {
                copy_failures.push(item.id.clone());
            } else {
                delete_ops.push(BulkOp::Delete {
                    index: self.alert_index.clone(),
                    id: item.id.clone(),
                    routing: monitor_id.to_string(),
                });
            }
        }

        let mut delete_failures = Vec::new();
        if !delete_ops.is_empty() {
            for item in &self.cluster.bulk(&delete_ops).await? {
                if item.is_failed() {
                    delete_failures.push(item.id.clone());
                }
            }
        }

        if copy_failures.is_empty() && delete_failures.is_empty() {
            debug!(monitor_id, moved = hits.len(), "moved stale alerts to history");
            Ok(())
        } else {
            Err(RunnerError::Cluster(format!(
                "failed to move alerts for monitor {monitor_id}: copy failures {copy_failures:?}, delete failures {delete_failures:?}"
            )))
        }
    }
}

fn doc_id(alert: &Alert) -> Option<String> {
    (alert.id != NO_ID).then(|| alert.id.clone())
}

fn alert_source(alert: &Alert) -> Result<Value, RunnerError> {
    serde_json::to_value(alert)
        .map_err(|e| RunnerError::Cluster(format!("failed to serialize alert: {e}")))
}

fn parse_alert_hit(hit: &Value) -> Result<Alert, RunnerError> {
    let mut alert: Alert = serde_json::from_value(hit["_source"].clone())
        .map_err(|e| RunnerError::Cluster(format!("malformed alert document: {e}")))?;
    alert.id = hit["_id"].as_str().unwrap_or(NO_ID).to_string();
    Ok(alert)
}

fn raise_on_shard_failures(response: &Value) -> Result<(), RunnerError> {
    let failed = response["_shards"]["failed"].as_u64().unwrap_or(0);
    if failed == 0 {
        return Ok(());
    }
    let reason = response["_shards"]["failures"][0]["reason"]["reason"]
        .as_str()
        .unwrap_or("search failed on one or more shards");
    Err(RunnerError::Cluster(reason.to_string()))
}

/// Minimal mapping for both alert indices: the fields the runner queries
/// and routes on. Full mapping management belongs to the index bootstrap.
fn alert_index_body() -> Value {
    json!({
        "settings": {"index": {"number_of_shards": 1, "auto_expand_replicas": "0-1"}},
        "mappings": {
            "dynamic": false,
            "properties": {
                "schema_version": {"type": "integer"},
                "monitor_id": {"type": "keyword"},
                "monitor_name": {"type": "keyword"},
                "trigger_id": {"type": "keyword"},
                "trigger_name": {"type": "keyword"},
                "severity": {"type": "keyword"},
                "state": {"type": "keyword"},
                "start_time": {"type": "date", "format": "epoch_millis"},
                "last_notification_time": {"type": "date", "format": "epoch_millis"},
                "acknowledged_time": {"type": "date", "format": "epoch_millis"},
                "end_time": {"type": "date", "format": "epoch_millis"},
                "error_message": {"type": "text"},
                "error_history": {
                    "properties": {
                        "timestamp": {"type": "date", "format": "epoch_millis"},
                        "message": {"type": "text"},
                    },
                },
                "action_execution_results": {
                    "properties": {
                        "action_id": {"type": "keyword"},
                        "last_execution_time": {"type": "date", "format": "epoch_millis"},
                        "throttled_count": {"type": "integer"},
                    },
                },
            },
        },
    })
}
