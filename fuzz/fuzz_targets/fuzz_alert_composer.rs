#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;

use domain::alert::composer::compose_alert;
use domain::alert::entity::{
    ActionExecutionResult, Alert, AlertState, ErrorHistoryEntry, MAX_ERROR_HISTORY,
};
use domain::monitor::context::TriggerExecutionContext;
use domain::monitor::entity::{Monitor, Script, Trigger};
use domain::monitor::run_result::{ActionRunResult, MonitorRunResult, TriggerRunResult};

// Fuzz the alert composer: arbitrary prior state, trigger outcome, and
// action-result mixes must never break the composer's invariants.
//
// Layout:
//   [0]    = prior alert state selector (0 = none)
//   [1]    = triggered / error flags
//   [2]    = prior error-history length (0–31)
//   [3]    = number of action results (0–7)
//   rest   = per-action flags (throttled / present-in-prior)
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let monitor = Monitor {
        id: "fuzz-monitor".to_string(),
        name: "fuzz".to_string(),
        enabled: true,
        user: None,
        inputs: Vec::new(),
        triggers: vec![Trigger {
            id: "fuzz-trigger".to_string(),
            name: "fuzz trigger".to_string(),
            severity: "1".to_string(),
            condition: Script::painless("true"),
            actions: Vec::new(),
        }],
        schema_version: 1,
    };
    let start = Utc.timestamp_millis_opt(1_000).unwrap();
    let now = Utc.timestamp_millis_opt(2_000).unwrap();
    let monitor_result = MonitorRunResult::new(monitor.name.clone(), start, now);

    let prior_state = match data[0] % 6 {
        0 => None,
        1 => Some(AlertState::Active),
        2 => Some(AlertState::Acknowledged),
        3 => Some(AlertState::Completed),
        4 => Some(AlertState::Error),
        _ => Some(AlertState::Deleted),
    };
    let triggered = data[1] & 1 != 0;
    let has_error = data[1] & 2 != 0;
    let history_len = (data[2] % 32) as usize;
    let action_count = (data[3] % 8) as usize;

    let prior = prior_state.map(|state| {
        let mut alert = Alert::new(&monitor, &monitor.triggers[0], state, start, None);
        alert.error_history = (0..history_len)
            .map(|i| ErrorHistoryEntry {
                timestamp: start,
                message: format!("old-{i}"),
            })
            .collect();
        alert.action_execution_results = (0..action_count)
            .filter(|i| data.get(4 + i).copied().unwrap_or(0) & 2 != 0)
            .map(|i| ActionExecutionResult {
                action_id: format!("action-{i}"),
                last_execution_time: Some(start),
                throttled_count: i32::try_from(i).unwrap_or(0),
            })
            .collect();
        alert
    });

    let mut result = TriggerRunResult::new("fuzz trigger".to_string(), triggered, None);
    for i in 0..action_count {
        let throttled = data.get(4 + i).copied().unwrap_or(0) & 1 != 0;
        let run = if throttled {
            ActionRunResult::throttled(format!("action-{i}"), format!("action {i}"))
        } else {
            ActionRunResult {
                action_id: format!("action-{i}"),
                action_name: format!("action {i}"),
                output: std::collections::BTreeMap::new(),
                throttled: false,
                execution_time: Some(now),
                error: None,
            }
        };
        result.action_results.insert(format!("action-{i}"), run);
    }

    let alert_error = has_error.then_some("fuzz failure");
    let prior_counts: Vec<(String, i32)> = prior
        .as_ref()
        .map(|alert| {
            alert
                .action_execution_results
                .iter()
                .map(|r| (r.action_id.clone(), r.throttled_count))
                .collect()
        })
        .unwrap_or_default();

    let ctx = TriggerExecutionContext::new(
        &monitor,
        &monitor.triggers[0],
        &monitor_result,
        prior.as_ref(),
    );
    let Some(composed) = compose_alert(&ctx, &result, alert_error, now) else {
        return;
    };

    // The composer only ever emits these three states.
    assert!(matches!(
        composed.state,
        AlertState::Active | AlertState::Error | AlertState::Completed
    ));
    assert!(composed.error_history.len() <= MAX_ERROR_HISTORY);
    // Throttle counters never go backwards.
    for (action_id, previous_count) in prior_counts {
        if let Some(merged) = composed
            .action_execution_results
            .iter()
            .find(|r| r.action_id == action_id)
        {
            assert!(merged.throttled_count >= previous_count);
        }
    }
});
