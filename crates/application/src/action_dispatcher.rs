use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::debug;

use domain::alert::throttle::is_action_actionable;
use domain::common::error::RunnerError;
use domain::monitor::context::TriggerExecutionContext;
use domain::monitor::entity::Action;
use domain::monitor::run_result::ActionRunResult;
use ports::secondary::destination_port::{DestinationPublisher, DestinationRegistry};
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::script_port::TemplateEnginePort;

use crate::settings::{DestinationContextFactory, SettingsHandle};

const OUTPUT_SUBJECT: &str = "subject";
const OUTPUT_MESSAGE: &str = "message";
const OUTPUT_MESSAGE_ID: &str = "message_id";

/// Renders action templates and publishes them, honoring throttling, the
/// destination allow list, and the host deny list.
pub struct ActionDispatcher {
    templates: Arc<dyn TemplateEnginePort>,
    destinations: Arc<dyn DestinationRegistry>,
    publisher: Arc<dyn DestinationPublisher>,
    contexts: Arc<DestinationContextFactory>,
    settings: SettingsHandle,
    metrics: Arc<dyn MetricsPort>,
}

impl ActionDispatcher {
    pub fn new(
        templates: Arc<dyn TemplateEnginePort>,
        destinations: Arc<dyn DestinationRegistry>,
        publisher: Arc<dyn DestinationPublisher>,
        contexts: Arc<DestinationContextFactory>,
        settings: SettingsHandle,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            templates,
            destinations,
            publisher,
            contexts,
            settings,
            metrics,
        }
    }

    /// Run one action of an actionable trigger.
    ///
    /// Never returns an error: a failed dispatch is recorded on the result
    /// and stays visible there, so a broken channel cannot mask the trigger
    /// signal or change the alert state.
    pub async fn run_action(
        &self,
        action: &Action,
        ctx: &TriggerExecutionContext<'_>,
        dryrun: bool,
        now: DateTime<Utc>,
    ) -> ActionRunResult {
        if !is_action_actionable(action, ctx.alert, now) {
            debug!(action_id = %action.id, "action inside throttle window");
            self.metrics.record_action_dispatch("throttled");
            return ActionRunResult::throttled(action.id.clone(), action.name.clone());
        }

        match self.execute(action, ctx, dryrun).await {
            Ok(output) => {
                self.metrics.record_action_dispatch("published");
                ActionRunResult {
                    action_id: action.id.clone(),
                    action_name: action.name.clone(),
                    output,
                    throttled: false,
                    execution_time: Some(now),
                    error: None,
                }
            }
            Err(error) => {
                self.metrics.record_action_dispatch("failed");
                ActionRunResult {
                    action_id: action.id.clone(),
                    action_name: action.name.clone(),
                    output: BTreeMap::new(),
                    throttled: false,
                    execution_time: Some(now),
                    error: Some(error.to_string()),
                }
            }
        }
    }

    async fn execute(
        &self,
        action: &Action,
        ctx: &TriggerExecutionContext<'_>,
        dryrun: bool,
    ) -> Result<BTreeMap<String, String>, RunnerError> {
        let params = json!({"ctx": ctx.as_template_arg()});

        let subject = match &action.subject_template {
            Some(template) => self.templates.render(template, &params)?,
            None => String::new(),
        };
        let message = self.templates.render(&action.message_template, &params)?;
        if message.trim().is_empty() {
            return Err(RunnerError::Destination(format!(
                "Message content missing in the destination with id: {}",
                action.destination_id
            )));
        }

        let mut output = BTreeMap::new();
        output.insert(OUTPUT_SUBJECT.to_string(), subject.clone());
        output.insert(OUTPUT_MESSAGE.to_string(), message.clone());

        if dryrun {
            return Ok(output);
        }

        let settings = self.settings.snapshot();
        let destination = self.destinations.get(&action.destination_id).await?;
        if !settings.destination_allowed(destination.dest_type) {
            return Err(RunnerError::Destination(format!(
                "destination type [{}] is not allowed",
                destination.dest_type.as_str()
            )));
        }

        let dest_ctx = self.contexts.context_for(&destination);
        let subject_arg = (!subject.is_empty()).then_some(subject.as_str());
        let message_id = self
            .publisher
            .publish(
                &settings.aws_sns,
                subject_arg,
                &message,
                &destination,
                &dest_ctx,
                &settings.destination_host_deny_list,
            )
            .await?;
        output.insert(OUTPUT_MESSAGE_ID.to_string(), message_id);
        Ok(output)
    }
}
