use tracing::info;

use domain::monitor::context::TriggerExecutionContext;
use domain::monitor::run_result::TriggerRunResult;
use ports::secondary::script_port::ConditionEnginePort;

/// Evaluate a trigger's boolean condition against its execution context.
///
/// A condition failure reports `triggered = true` with the error attached,
/// forcing an error alert on the user's behalf so the broken script is
/// visible instead of silently never firing.
pub fn evaluate_trigger(
    conditions: &dyn ConditionEnginePort,
    ctx: &TriggerExecutionContext<'_>,
) -> TriggerRunResult {
    let arg = ctx.as_template_arg();
    match conditions.evaluate(&ctx.trigger.condition, &arg) {
        Ok(triggered) => TriggerRunResult::new(ctx.trigger.name.clone(), triggered, None),
        Err(error) => {
            info!(
                monitor_id = %ctx.monitor.id,
                trigger_id = %ctx.trigger.id,
                error = %error,
                "trigger condition failed"
            );
            TriggerRunResult::new(ctx.trigger.name.clone(), true, Some(error.to_string()))
        }
    }
}
