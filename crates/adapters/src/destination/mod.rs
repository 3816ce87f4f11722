pub mod email;
pub mod registry;
pub mod webhook;

use std::future::Future;
use std::pin::Pin;

use domain::common::error::RunnerError;
use domain::destination::entity::{Destination, DestinationContext, DestinationType};
use domain::settings::AwsSnsSettings;
use ports::secondary::destination_port::DestinationPublisher;

use self::email::EmailPublisher;
use self::webhook::WebhookPublisher;

/// Routes a publish to the transport for the destination's type.
///
/// SNS stays behind the port: publishing through it needs the AWS transport
/// of the host distribution, which this repository does not ship.
pub struct PublisherRouter {
    webhook: WebhookPublisher,
    email: EmailPublisher,
}

impl PublisherRouter {
    pub fn new() -> Self {
        Self {
            webhook: WebhookPublisher::new(),
            email: EmailPublisher::new(),
        }
    }
}

impl Default for PublisherRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationPublisher for PublisherRouter {
    fn publish<'a>(
        &'a self,
        _aws: &'a AwsSnsSettings,
        subject: Option<&'a str>,
        message: &'a str,
        destination: &'a Destination,
        dest_ctx: &'a DestinationContext,
        host_deny_list: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<String, RunnerError>> + Send + 'a>> {
        Box::pin(async move {
            match destination.dest_type {
                DestinationType::Slack
                | DestinationType::Chime
                | DestinationType::CustomWebhook => {
                    self.webhook.send(message, destination, host_deny_list).await
                }
                DestinationType::Email => {
                    self.email
                        .send(subject, message, destination, dest_ctx, host_deny_list)
                        .await
                }
                DestinationType::Sns => Err(RunnerError::Destination(format!(
                    "SNS transport is not configured on this node (destination {})",
                    destination.id
                ))),
                // Used by the preview API: report success without leaving
                // the process.
                DestinationType::TestAction => Ok("test-action-message-id".to_string()),
            }
        })
    }
}

/// Reject publishes to denied hosts before any connection is opened.
pub(crate) fn check_host_allowed(host: &str, host_deny_list: &[String]) -> Result<(), RunnerError> {
    let host = host.to_ascii_lowercase();
    if host_deny_list.iter().any(|denied| denied.eq_ignore_ascii_case(&host)) {
        return Err(RunnerError::Destination(format!(
            "publishing to host {host} is blocked by the host deny list"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::destination::entity::SnsTarget;

    fn destination(dest_type: DestinationType) -> Destination {
        Destination {
            id: "d1".to_string(),
            name: "dest".to_string(),
            dest_type,
            slack: None,
            chime: None,
            custom_webhook: None,
            email: None,
            sns: Some(SnsTarget {
                topic_arn: "arn:aws:sns:us-east-1:123:alerts".to_string(),
                role_arn: Some("arn:aws:iam::123:role/publish".to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn test_action_publishes_nowhere() {
        let router = PublisherRouter::new();
        let message_id = router
            .publish(
                &AwsSnsSettings::default(),
                None,
                "msg",
                &destination(DestinationType::TestAction),
                &DestinationContext::default(),
                &[],
            )
            .await
            .unwrap();
        assert_eq!(message_id, "test-action-message-id");
    }

    #[tokio::test]
    async fn sns_without_transport_raises() {
        let router = PublisherRouter::new();
        let error = router
            .publish(
                &AwsSnsSettings::default(),
                None,
                "msg",
                &destination(DestinationType::Sns),
                &DestinationContext::default(),
                &[],
            )
            .await
            .unwrap_err();
        assert!(error.to_string().contains("SNS transport"), "{error}");
    }

    #[test]
    fn deny_list_matches_case_insensitively() {
        let deny = vec!["Hooks.Internal.Example".to_string()];
        assert!(check_host_allowed("hooks.internal.example", &deny).is_err());
        assert!(check_host_allowed("hooks.public.example", &deny).is_ok());
        assert!(check_host_allowed("hooks.internal.example", &[]).is_ok());
    }
}
