/// Metrics recorded by the runner pipeline. Default implementations are
/// no-ops so test doubles only override what they assert on.
pub trait MetricsPort: Send + Sync {
    /// `result` is `ok` or `error`.
    fn record_monitor_run(&self, result: &str) {
        let _ = result;
    }

    fn record_trigger_evaluation(&self, triggered: bool) {
        let _ = triggered;
    }

    /// `outcome` is `published`, `throttled`, or `failed`.
    fn record_action_dispatch(&self, outcome: &str) {
        let _ = outcome;
    }

    /// `state` is the persisted alert state label.
    fn record_alert_write(&self, state: &str) {
        let _ = state;
    }

    /// One resubmission of backpressured bulk items.
    fn record_bulk_retry(&self) {}

    /// `result` is `success` or `rejected`.
    fn record_settings_reload(&self, result: &str) {
        let _ = result;
    }
}
