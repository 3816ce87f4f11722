use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use domain::alert::composer::compose_alert;
use domain::alert::throttle::is_trigger_actionable;
use domain::common::error::RunnerError;
use domain::monitor::context::TriggerExecutionContext;
use domain::monitor::entity::{Monitor, NO_ID, ScheduledJob};
use domain::monitor::run_result::MonitorRunResult;
use ports::primary::job_runner::JobRunner;
use ports::secondary::cluster_port::ClusterPort;
use ports::secondary::destination_port::{DestinationPublisher, DestinationRegistry};
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::script_port::{ConditionEnginePort, TemplateEnginePort};

use crate::action_dispatcher::ActionDispatcher;
use crate::alert_store::AlertStore;
use crate::input_collector::InputCollector;
use crate::settings::{DestinationContextFactory, SettingsHandle};
use crate::trigger_evaluator::evaluate_trigger;

/// The per-monitor execution pipeline and its task lifecycle.
///
/// One long-lived instance serves the whole process. Scheduler callbacks
/// spawn child tasks under the supervisor token; cancelling the supervisor
/// stops every in-flight run at its next suspension point, and a child
/// failure never affects its siblings.
#[derive(Clone)]
pub struct MonitorRunner {
    inner: Arc<RunnerInner>,
    supervisor: CancellationToken,
}

struct RunnerInner {
    alert_store: AlertStore,
    input_collector: InputCollector,
    conditions: Arc<dyn ConditionEnginePort>,
    dispatcher: ActionDispatcher,
    metrics: Arc<dyn MetricsPort>,
}

impl MonitorRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster: Arc<dyn ClusterPort>,
        templates: Arc<dyn TemplateEnginePort>,
        conditions: Arc<dyn ConditionEnginePort>,
        destinations: Arc<dyn DestinationRegistry>,
        publisher: Arc<dyn DestinationPublisher>,
        contexts: Arc<DestinationContextFactory>,
        settings: SettingsHandle,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        let alert_store = AlertStore::new(
            Arc::clone(&cluster),
            settings.clone(),
            Arc::clone(&metrics),
        );
        let input_collector = InputCollector::new(cluster, Arc::clone(&templates));
        let dispatcher = ActionDispatcher::new(
            templates,
            destinations,
            publisher,
            contexts,
            settings,
            Arc::clone(&metrics),
        );
        Self {
            inner: Arc::new(RunnerInner {
                alert_store,
                input_collector,
                conditions,
                dispatcher,
                metrics,
            }),
            supervisor: CancellationToken::new(),
        }
    }

    /// Cancel the supervisor: every in-flight run stops at its next
    /// suspension point. Publishes that already went out stay out; alert
    /// persistence is best-effort and not compensated.
    pub fn shutdown(&self) {
        self.supervisor.cancel();
    }

    /// Execute one monitor over one period.
    ///
    /// With `dryrun` (or an unsaved monitor) nothing is persisted and no
    /// message leaves the process; the returned result carries the rendered
    /// outputs instead.
    pub async fn run_monitor(
        &self,
        monitor: &Monitor,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        dryrun: bool,
    ) -> MonitorRunResult {
        let mut monitor_result =
            MonitorRunResult::new(monitor.name.clone(), period_start, period_end);
        if period_start == period_end {
            warn!(
                monitor_id = %monitor.id,
                period_start = %period_start,
                "period start and end are equal, likely a one-shot execution"
            );
        }
        let roles = monitor.run_roles();

        // Without the current alerts we cannot tell live ACTIVE alerts from
        // stale ones, so writing ERROR alerts here could clobber real state.
        // Record the failure on the result and stop.
        let current_alerts = match self.load_current_alerts(monitor).await {
            Ok(current) => current,
            Err(load_error) => {
                error!(
                    monitor_id = %monitor.id,
                    error = %load_error,
                    "failed to load current alerts, aborting run"
                );
                self.inner.metrics.record_monitor_run("error");
                monitor_result.error = Some(format!("Failed to load current alerts: {load_error}"));
                return monitor_result;
            }
        };

        monitor_result.input_results = match self
            .inner
            .input_collector
            .collect(monitor, period_start, period_end, &roles)
            .await
        {
            Ok(input_results) => input_results,
            Err(fatal) => {
                error!(monitor_id = %monitor.id, error = %fatal, "monitor has an invalid input");
                self.inner.metrics.record_monitor_run("error");
                monitor_result.error = Some(fatal.to_string());
                return monitor_result;
            }
        };

        let mut updated_alerts = Vec::new();
        for trigger in &monitor.triggers {
            let now = Utc::now();
            let prior = current_alerts.get(&trigger.id).and_then(Option::as_ref);
            let ctx = TriggerExecutionContext::new(monitor, trigger, &monitor_result, prior);

            let mut trigger_result = evaluate_trigger(self.inner.conditions.as_ref(), &ctx);
            self.inner
                .metrics
                .record_trigger_evaluation(trigger_result.triggered);

            if is_trigger_actionable(&ctx, &trigger_result) {
                for action in &trigger.actions {
                    let action_result =
                        self.inner.dispatcher.run_action(action, &ctx, dryrun, now).await;
                    trigger_result
                        .action_results
                        .insert(action.id.clone(), action_result);
                }
            }

            let alert_error = ctx.error.clone().or_else(|| trigger_result.error.clone());
            if let Some(alert) = compose_alert(&ctx, &trigger_result, alert_error.as_deref(), now) {
                updated_alerts.push(alert);
            }
            monitor_result
                .trigger_results
                .insert(trigger.id.clone(), trigger_result);
        }

        if !dryrun && monitor.id != NO_ID {
            if let Err(save_error) = self.inner.alert_store.save(&updated_alerts).await {
                error!(monitor_id = %monitor.id, error = %save_error, "failed to save alerts");
                monitor_result
                    .error
                    .get_or_insert_with(|| format!("Failed to save alerts: {save_error}"));
            }
        } else {
            debug!(monitor_id = %monitor.id, dryrun, "skipping alert persistence");
        }

        self.inner.metrics.record_monitor_run(if monitor_result.error.is_some() {
            "error"
        } else {
            "ok"
        });
        monitor_result
    }

    async fn load_current_alerts(
        &self,
        monitor: &Monitor,
    ) -> Result<std::collections::HashMap<String, Option<domain::alert::entity::Alert>>, RunnerError>
    {
        self.inner.alert_store.ensure_indices().await?;
        self.inner.alert_store.load_current_alerts(monitor).await
    }
}

impl JobRunner for MonitorRunner {
    fn run_job(
        &self,
        job: ScheduledJob,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<(), RunnerError> {
        let monitor = match job {
            ScheduledJob::Monitor(monitor) => monitor,
            ScheduledJob::Foreign { id, job_type } => {
                return Err(RunnerError::InvalidJob(format!(
                    "job {id} has kind {job_type}, expected a monitor"
                )));
            }
        };

        let runner = self.clone();
        let token = self.supervisor.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    info!(monitor_id = %monitor.id, "monitor run cancelled");
                }
                result = runner.run_monitor(&monitor, period_start, period_end, false) => {
                    if let Some(run_error) = &result.error {
                        error!(
                            monitor_id = %monitor.id,
                            error = %run_error,
                            "monitor run finished with error"
                        );
                    }
                }
            }
        });
        Ok(())
    }

    fn post_index(&self, monitor: &Monitor) {
        let runner = self.clone();
        let monitor = monitor.clone();
        let token = self.supervisor.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                result = runner.inner.alert_store.move_alerts(&monitor.id, Some(&monitor)) => {
                    if let Err(move_error) = result {
                        error!(
                            monitor_id = %monitor.id,
                            error = %move_error,
                            "failed to move alerts after monitor update"
                        );
                    }
                }
            }
        });
    }

    fn post_delete(&self, monitor_id: &str) {
        let runner = self.clone();
        let monitor_id = monitor_id.to_string();
        let token = self.supervisor.child_token();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                result = runner.inner.alert_store.move_alerts(&monitor_id, None) => {
                    if let Err(move_error) = result {
                        error!(
                            monitor_id = %monitor_id,
                            error = %move_error,
                            "failed to move alerts after monitor delete"
                        );
                    }
                }
            }
        });
    }
}
