use serde_json::Value;

use domain::common::error::RunnerError;
use domain::monitor::entity::Script;

/// Template half of the scripting engine: renders query and message
/// templates against their parameters. Pure CPU work, so the methods are
/// synchronous.
pub trait TemplateEnginePort: Send + Sync {
    fn render(&self, template: &Script, params: &Value) -> Result<String, RunnerError>;
}

/// Condition half of the scripting engine: compiles and executes a boolean
/// trigger condition against the trigger execution context. The engine
/// itself lives outside this repository; the runner only depends on this
/// contract.
pub trait ConditionEnginePort: Send + Sync {
    fn evaluate(&self, condition: &Script, ctx: &Value) -> Result<bool, RunnerError>;
}
