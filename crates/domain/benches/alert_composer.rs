use chrono::{TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use domain::alert::composer::compose_alert;
use domain::alert::entity::{ActionExecutionResult, Alert, AlertState};
use domain::monitor::context::TriggerExecutionContext;
use domain::monitor::entity::{Monitor, Script, Trigger};
use domain::monitor::run_result::{ActionRunResult, MonitorRunResult, TriggerRunResult};

fn fixture_monitor() -> Monitor {
    Monitor {
        id: "bench-monitor".to_string(),
        name: "bench".to_string(),
        enabled: true,
        user: None,
        inputs: Vec::new(),
        triggers: vec![Trigger {
            id: "bench-trigger".to_string(),
            name: "bench trigger".to_string(),
            severity: "1".to_string(),
            condition: Script::painless("true"),
            actions: Vec::new(),
        }],
        schema_version: 1,
    }
}

fn bench_compose(c: &mut Criterion) {
    let monitor = fixture_monitor();
    let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    let monitor_result = MonitorRunResult::new(monitor.name.clone(), now, now);

    let mut prior = Alert::new(
        &monitor,
        &monitor.triggers[0],
        AlertState::Active,
        now,
        None,
    );
    prior.action_execution_results = (0..16)
        .map(|i| ActionExecutionResult {
            action_id: format!("action-{i}"),
            last_execution_time: Some(now),
            throttled_count: i,
        })
        .collect();

    let mut trigger_result = TriggerRunResult::new("bench trigger".to_string(), true, None);
    for i in 0..16 {
        trigger_result.action_results.insert(
            format!("action-{i}"),
            ActionRunResult {
                action_id: format!("action-{i}"),
                action_name: format!("action {i}"),
                output: std::collections::BTreeMap::new(),
                throttled: i % 2 == 0,
                execution_time: Some(now),
                error: None,
            },
        );
    }

    c.bench_function("compose_active_alert_16_actions", |b| {
        b.iter(|| {
            let ctx = TriggerExecutionContext::new(
                &monitor,
                &monitor.triggers[0],
                &monitor_result,
                Some(&prior),
            );
            black_box(compose_alert(
                black_box(&ctx),
                black_box(&trigger_result),
                None,
                now,
            ))
        });
    });
}

criterion_group!(benches, bench_compose);
criterion_main!(benches);
