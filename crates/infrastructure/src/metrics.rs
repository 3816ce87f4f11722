use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use ports::secondary::metrics_port::MetricsPort;

// ── Label types ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StateLabels {
    state: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct TriggeredLabels {
    triggered: bool,
}

/// Prometheus registry for the runner pipeline.
///
/// Counters use interior mutability, so recording needs only `&self`; wrap
/// in `Arc` to share across tasks.
pub struct RunnerMetrics {
    registry: Registry,
    monitor_runs_total: Family<ResultLabels, Counter>,
    trigger_evaluations_total: Family<TriggeredLabels, Counter>,
    action_dispatches_total: Family<OutcomeLabels, Counter>,
    alert_writes_total: Family<StateLabels, Counter>,
    bulk_retries_total: Counter,
    settings_reloads_total: Family<ResultLabels, Counter>,
}

impl RunnerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("watchtower_runner");

        let monitor_runs_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "monitor_runs",
            "Monitor runs by result",
            monitor_runs_total.clone(),
        );

        let trigger_evaluations_total = Family::<TriggeredLabels, Counter>::default();
        registry.register(
            "trigger_evaluations",
            "Trigger condition evaluations by outcome",
            trigger_evaluations_total.clone(),
        );

        let action_dispatches_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "action_dispatches",
            "Action dispatches by outcome",
            action_dispatches_total.clone(),
        );

        let alert_writes_total = Family::<StateLabels, Counter>::default();
        registry.register(
            "alert_writes",
            "Alerts persisted by state",
            alert_writes_total.clone(),
        );

        let bulk_retries_total = Counter::default();
        registry.register(
            "bulk_retries",
            "Resubmissions of backpressured alert bulk items",
            bulk_retries_total.clone(),
        );

        let settings_reloads_total = Family::<ResultLabels, Counter>::default();
        registry.register(
            "settings_reloads",
            "Settings reload attempts by result",
            settings_reloads_total.clone(),
        );

        Self {
            registry,
            monitor_runs_total,
            trigger_evaluations_total,
            action_dispatches_total,
            alert_writes_total,
            bulk_retries_total,
            settings_reloads_total,
        }
    }

    /// Text exposition for the metrics endpoint of the host process.
    pub fn render(&self) -> String {
        let mut output = String::new();
        // Encoding only fails on a broken `fmt::Write`, which String is not.
        let _ = encode(&mut output, &self.registry);
        output
    }
}

impl Default for RunnerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsPort for RunnerMetrics {
    fn record_monitor_run(&self, result: &str) {
        self.monitor_runs_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }

    fn record_trigger_evaluation(&self, triggered: bool) {
        self.trigger_evaluations_total
            .get_or_create(&TriggeredLabels { triggered })
            .inc();
    }

    fn record_action_dispatch(&self, outcome: &str) {
        self.action_dispatches_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    fn record_alert_write(&self, state: &str) {
        self.alert_writes_total
            .get_or_create(&StateLabels {
                state: state.to_string(),
            })
            .inc();
    }

    fn record_bulk_retry(&self) {
        self.bulk_retries_total.inc();
    }

    fn record_settings_reload(&self, result: &str) {
        self.settings_reloads_total
            .get_or_create(&ResultLabels {
                result: result.to_string(),
            })
            .inc();
    }
}
