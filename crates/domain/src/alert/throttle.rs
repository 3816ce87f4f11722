//! Dispatch gating: which triggers may run actions at all, and which
//! individual actions are inside their throttle window.

use chrono::{DateTime, Utc};

use crate::alert::entity::Alert;
use crate::monitor::context::TriggerExecutionContext;
use crate::monitor::entity::Action;
use crate::monitor::run_result::TriggerRunResult;

/// Whether an action may publish on this run.
///
/// Always actionable without a prior alert, without a throttle, or with
/// throttling disabled. Otherwise the last recorded execution must lie
/// strictly before `now - throttle window`.
pub fn is_action_actionable(action: &Action, alert: Option<&Alert>, now: DateTime<Utc>) -> bool {
    let (Some(alert), Some(throttle)) = (alert, &action.throttle) else {
        return true;
    };
    if !throttle.enabled {
        return true;
    }

    let last_execution = alert
        .action_execution_results
        .iter()
        .find(|result| result.action_id == action.id)
        .and_then(|result| result.last_execution_time);

    match last_execution {
        None => true,
        Some(last) => last < now - throttle.window(),
    }
}

/// Whether a trigger's actions should run at all.
///
/// An acknowledged alert suppresses further dispatches unless a new error
/// appeared at either the monitor or the trigger level.
pub fn is_trigger_actionable(
    ctx: &TriggerExecutionContext<'_>,
    result: &TriggerRunResult,
) -> bool {
    if !result.triggered {
        return false;
    }
    let suppressed = ctx.alert.is_some_and(Alert::is_acknowledged)
        && result.error.is_none()
        && ctx.error.is_none();
    !suppressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::entity::{ActionExecutionResult, AlertState};
    use crate::monitor::entity::{Monitor, Script, Throttle, ThrottleUnit, Trigger};
    use crate::monitor::run_result::MonitorRunResult;
    use chrono::TimeZone;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn action(throttle: Option<Throttle>) -> Action {
        Action {
            id: "a1".to_string(),
            name: "page oncall".to_string(),
            destination_id: "d1".to_string(),
            subject_template: None,
            message_template: Script::mustache("it broke"),
            throttle,
        }
    }

    fn ten_minute_throttle(enabled: bool) -> Throttle {
        Throttle {
            value: 10,
            unit: ThrottleUnit::Minutes,
            enabled,
        }
    }

    fn monitor() -> Monitor {
        Monitor {
            id: "m1".to_string(),
            name: "watcher".to_string(),
            enabled: true,
            user: None,
            inputs: Vec::new(),
            triggers: vec![Trigger {
                id: "t1".to_string(),
                name: "fires".to_string(),
                severity: "3".to_string(),
                condition: Script::painless("true"),
                actions: Vec::new(),
            }],
            schema_version: 1,
        }
    }

    fn alert_with_execution(last: Option<DateTime<Utc>>) -> Alert {
        let monitor = monitor();
        let mut alert = Alert::new(
            &monitor,
            &monitor.triggers[0],
            AlertState::Active,
            at(0),
            None,
        );
        alert.action_execution_results = vec![ActionExecutionResult {
            action_id: "a1".to_string(),
            last_execution_time: last,
            throttled_count: 0,
        }];
        alert
    }

    #[test]
    fn actionable_without_prior_alert_or_throttle() {
        let now = at(1_000_000);
        assert!(is_action_actionable(
            &action(Some(ten_minute_throttle(true))),
            None,
            now
        ));
        let alert = alert_with_execution(Some(now));
        assert!(is_action_actionable(&action(None), Some(&alert), now));
    }

    #[test]
    fn disabled_throttle_never_suppresses() {
        let now = at(1_000_000);
        let alert = alert_with_execution(Some(now));
        assert!(is_action_actionable(
            &action(Some(ten_minute_throttle(false))),
            Some(&alert),
            now
        ));
    }

    #[test]
    fn inside_window_is_suppressed_outside_is_not() {
        let window_millis = 10 * 60 * 1000;
        let now = at(window_millis * 3);
        let throttled_action = action(Some(ten_minute_throttle(true)));

        // Executed just now: suppressed.
        let alert = alert_with_execution(Some(now));
        assert!(!is_action_actionable(&throttled_action, Some(&alert), now));

        // Exactly on the boundary: still suppressed (strictly-before rule).
        let alert = alert_with_execution(Some(at(window_millis * 2)));
        assert!(!is_action_actionable(&throttled_action, Some(&alert), now));

        // One millisecond past the window: actionable again.
        let alert = alert_with_execution(Some(at(window_millis * 2 - 1)));
        assert!(is_action_actionable(&throttled_action, Some(&alert), now));
    }

    #[test]
    fn no_recorded_execution_is_actionable() {
        let now = at(1_000_000);
        let alert = alert_with_execution(None);
        assert!(is_action_actionable(
            &action(Some(ten_minute_throttle(true))),
            Some(&alert),
            now
        ));
    }

    #[test]
    fn untriggered_trigger_is_never_actionable() {
        let monitor = monitor();
        let result = MonitorRunResult::new(monitor.name.clone(), at(0), at(0));
        let ctx = TriggerExecutionContext::new(&monitor, &monitor.triggers[0], &result, None);
        let run = TriggerRunResult::new("fires".to_string(), false, None);
        assert!(!is_trigger_actionable(&ctx, &run));
    }

    #[test]
    fn acknowledged_alert_suppresses_actions() {
        let monitor = monitor();
        let result = MonitorRunResult::new(monitor.name.clone(), at(0), at(0));
        let mut alert = alert_with_execution(None);
        alert.state = AlertState::Acknowledged;
        let ctx =
            TriggerExecutionContext::new(&monitor, &monitor.triggers[0], &result, Some(&alert));
        let run = TriggerRunResult::new("fires".to_string(), true, None);
        assert!(!is_trigger_actionable(&ctx, &run));
    }

    #[test]
    fn acknowledged_alert_with_new_error_is_actionable_again() {
        let monitor = monitor();
        let result = MonitorRunResult::new(monitor.name.clone(), at(0), at(0));
        let mut alert = alert_with_execution(None);
        alert.state = AlertState::Acknowledged;
        let ctx =
            TriggerExecutionContext::new(&monitor, &monitor.triggers[0], &result, Some(&alert));
        let run = TriggerRunResult::new(
            "fires".to_string(),
            true,
            Some("condition failed".to_string()),
        );
        assert!(is_trigger_actionable(&ctx, &run));
    }

    #[test]
    fn active_alert_with_trigger_firing_is_actionable() {
        let monitor = monitor();
        let result = MonitorRunResult::new(monitor.name.clone(), at(0), at(0));
        let alert = alert_with_execution(None);
        let ctx =
            TriggerExecutionContext::new(&monitor, &monitor.triggers[0], &result, Some(&alert));
        let run = TriggerRunResult::new("fires".to_string(), true, None);
        assert!(is_trigger_actionable(&ctx, &run));
    }
}
