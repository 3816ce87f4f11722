use serde_json::{Value, json};

use domain::common::error::RunnerError;
use domain::destination::entity::{Destination, DestinationType};

use super::check_host_allowed;

/// POSTs rendered messages to chat and custom webhook endpoints.
pub struct WebhookPublisher {
    http: reqwest::Client,
}

impl WebhookPublisher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    pub async fn send(
        &self,
        message: &str,
        destination: &Destination,
        host_deny_list: &[String],
    ) -> Result<String, RunnerError> {
        let url = destination.url().ok_or_else(|| {
            RunnerError::Destination(format!(
                "destination {} has no webhook configuration",
                destination.id
            ))
        })?;
        let parsed = reqwest::Url::parse(url).map_err(|e| {
            RunnerError::Destination(format!("invalid webhook url for destination {}: {e}", destination.id))
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| RunnerError::Destination("webhook url has no host".to_string()))?;
        check_host_allowed(host, host_deny_list)?;

        let mut request = self
            .http
            .post(parsed)
            .json(&webhook_payload(destination.dest_type, message));
        if let Some(webhook) = &destination.custom_webhook {
            for (name, value) in &webhook.header_params {
                request = request.header(name, value);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| RunnerError::Destination(format!("webhook POST failed: {e}")))?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            // The response content stands in as the message id.
            Ok(body)
        } else {
            Err(RunnerError::Destination(format!(
                "webhook returned HTTP {status}: {body}"
            )))
        }
    }
}

impl Default for WebhookPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload per channel convention: Slack takes `text`, Chime takes
/// `Content`, custom webhooks get a generic `message` field.
fn webhook_payload(dest_type: DestinationType, message: &str) -> Value {
    match dest_type {
        DestinationType::Slack => json!({"text": message}),
        DestinationType::Chime => json!({"Content": message}),
        _ => json!({"message": message}),
    }
}
