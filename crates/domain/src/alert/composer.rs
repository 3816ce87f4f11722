use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::alert::entity::{
    ALERT_SCHEMA_VERSION, Alert, AlertState, ActionExecutionResult, ErrorHistoryEntry,
    MAX_ERROR_HISTORY,
};
use crate::monitor::context::TriggerExecutionContext;
use crate::monitor::run_result::TriggerRunResult;

/// Compute the next alert for a trigger from the previous alert (if any),
/// this run's trigger result, and the collapsed alert error.
///
/// Returns `None` when nothing should be written: the trigger never fired,
/// or the previous alert is ACKNOWLEDGED and suppresses updates. Suppression
/// holds whenever there is no error, regardless of the triggered flag, so an
/// acknowledged alert is left exactly as the user saw it until a new error
/// appears.
pub fn compose_alert(
    ctx: &TriggerExecutionContext<'_>,
    result: &TriggerRunResult,
    alert_error: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let prior = ctx.alert;
    let action_results = merge_action_results(prior, result);
    let error_history = merge_error_history(prior, alert_error, now);

    if alert_error.is_none() && prior.is_some_and(Alert::is_acknowledged) {
        return None;
    }

    if alert_error.is_none() && !result.triggered {
        return prior.map(|alert| Alert {
            state: AlertState::Completed,
            end_time: Some(now),
            error_message: None,
            error_history,
            action_execution_results: action_results,
            schema_version: ALERT_SCHEMA_VERSION,
            ..alert.clone()
        });
    }

    let state = if alert_error.is_none() {
        AlertState::Active
    } else {
        AlertState::Error
    };

    match prior {
        Some(alert) => Some(Alert {
            state,
            last_notification_time: Some(now),
            error_message: alert_error.map(str::to_string),
            error_history,
            action_execution_results: action_results,
            schema_version: ALERT_SCHEMA_VERSION,
            ..alert.clone()
        }),
        None => {
            let mut alert = Alert::new(
                ctx.monitor,
                ctx.trigger,
                state,
                now,
                alert_error.map(str::to_string),
            );
            alert.error_history = error_history;
            alert.action_execution_results = action_results;
            Some(alert)
        }
    }
}

/// Merge the previous alert's per-action bookkeeping with this run's
/// dispatch results.
///
/// Existing entries are kept when the action did not run, bumped when it was
/// throttled, and re-stamped with the new execution time otherwise. Actions
/// seen for the first time get a fresh entry.
fn merge_action_results(
    prior: Option<&Alert>,
    result: &TriggerRunResult,
) -> Vec<ActionExecutionResult> {
    let mut merged = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    if let Some(alert) = prior {
        for previous in &alert.action_execution_results {
            seen.insert(previous.action_id.as_str());
            match result.action_results.get(&previous.action_id) {
                None => merged.push(previous.clone()),
                Some(run) if run.throttled => merged.push(ActionExecutionResult {
                    throttled_count: previous.throttled_count + 1,
                    ..previous.clone()
                }),
                Some(run) => merged.push(ActionExecutionResult {
                    last_execution_time: run.execution_time,
                    ..previous.clone()
                }),
            }
        }
    }

    for (action_id, run) in &result.action_results {
        if !seen.contains(action_id.as_str()) {
            merged.push(ActionExecutionResult {
                action_id: action_id.clone(),
                last_execution_time: run.execution_time,
                throttled_count: i32::from(run.throttled),
            });
        }
    }

    merged
}

/// Prepend the new error (if any) to the prior history, newest first,
/// capped at [`MAX_ERROR_HISTORY`] entries.
fn merge_error_history(
    prior: Option<&Alert>,
    alert_error: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<ErrorHistoryEntry> {
    let prior_history = prior.map(|alert| alert.error_history.clone()).unwrap_or_default();
    match alert_error {
        None => prior_history,
        Some(message) => {
            let mut history = Vec::with_capacity((prior_history.len() + 1).min(MAX_ERROR_HISTORY));
            history.push(ErrorHistoryEntry {
                timestamp: now,
                message: message.to_string(),
            });
            history.extend(prior_history);
            history.truncate(MAX_ERROR_HISTORY);
            history
        }
    }
}
