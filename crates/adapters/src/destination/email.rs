use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use domain::common::error::RunnerError;
use domain::destination::entity::{Destination, DestinationContext, EmailTarget};

use super::check_host_allowed;

/// Sends rendered messages over SMTP to email destinations.
pub struct EmailPublisher;

impl EmailPublisher {
    pub fn new() -> Self {
        Self
    }

    pub async fn send(
        &self,
        subject: Option<&str>,
        message: &str,
        destination: &Destination,
        dest_ctx: &DestinationContext,
        host_deny_list: &[String],
    ) -> Result<String, RunnerError> {
        let target = destination.email.as_ref().ok_or_else(|| {
            RunnerError::Destination(format!(
                "destination {} has no email configuration",
                destination.id
            ))
        })?;
        check_host_allowed(&target.host, host_deny_list)?;

        let email = build_message(subject, message, destination, target)?;
        let transport = self.transport(target, dest_ctx)?;
        transport
            .send(email)
            .await
            .map_err(|e| RunnerError::Destination(format!("SMTP send failed: {e}")))?;
        Ok("Sent".to_string())
    }

    fn transport(
        &self,
        target: &EmailTarget,
        dest_ctx: &DestinationContext,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, RunnerError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&target.host)
            .map_err(|e| RunnerError::Destination(format!("SMTP relay setup failed: {e}")))?
            .port(target.port);
        if let (Some(username), Some(password)) = (
            dest_ctx.smtp_username.clone(),
            dest_ctx.smtp_password.clone(),
        ) {
            builder = builder.credentials(Credentials::new(username, password));
        }
        Ok(builder.build())
    }
}

impl Default for EmailPublisher {
    fn default() -> Self {
        Self::new()
    }
}

fn build_message(
    subject: Option<&str>,
    message: &str,
    destination: &Destination,
    target: &EmailTarget,
) -> Result<Message, RunnerError> {
    if target.recipients.is_empty() {
        return Err(RunnerError::Destination(format!(
            "destination {} has no recipients",
            destination.id
        )));
    }

    let mut builder = Message::builder()
        .from(target.from.parse().map_err(|e| {
            RunnerError::Destination(format!("invalid from address {}: {e}", target.from))
        })?)
        .subject(subject.unwrap_or(&destination.name))
        .header(ContentType::TEXT_PLAIN);
    for recipient in &target.recipients {
        builder = builder.to(recipient.parse().map_err(|e| {
            RunnerError::Destination(format!("invalid recipient {recipient}: {e}"))
        })?);
    }
    builder
        .body(message.to_string())
        .map_err(|e| RunnerError::Destination(format!("failed to build email: {e}")))
}
