use handlebars::Handlebars;
use serde_json::Value;

use domain::common::error::RunnerError;
use domain::monitor::entity::Script;
use ports::secondary::script_port::TemplateEnginePort;

/// Mustache-style template rendering on top of handlebars.
///
/// Covers the template half of the script contract: query templates
/// (`{{period_start}}`/`{{period_end}}`) and action subject/message
/// templates (`{{ctx.monitor.name}}` and friends). Escaping is disabled
/// because rendered query templates must stay valid JSON.
pub struct HandlebarsTemplateEngine {
    registry: Handlebars<'static>,
}

impl HandlebarsTemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }
}

impl Default for HandlebarsTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEnginePort for HandlebarsTemplateEngine {
    fn render(&self, template: &Script, params: &Value) -> Result<String, RunnerError> {
        if template.lang != "mustache" {
            return Err(RunnerError::Script(format!(
                "unsupported template language: {}",
                template.lang
            )));
        }
        self.registry
            .render_template(&template.source, params)
            .map_err(|e| RunnerError::Script(format!("template render failed: {e}")))
    }
}
