use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::monitor::entity::NO_ID;

/// Index holding monitor and destination configuration documents.
pub const CONFIG_INDEX: &str = ".watchtower-config";

/// Where an action's rendered message is delivered. Stored in the config
/// index; looked up by id at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    /// Document id; [`NO_ID`] for destinations built inline in tests.
    #[serde(skip, default = "unsaved_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub dest_type: DestinationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<WebhookTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chime: Option<WebhookTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_webhook: Option<CustomWebhook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sns: Option<SnsTarget>,
}

fn unsaved_id() -> String {
    NO_ID.to_string()
}

impl Destination {
    /// The HTTP endpoint for webhook-family destinations.
    pub fn url(&self) -> Option<&str> {
        match self.dest_type {
            DestinationType::Slack => self.slack.as_ref().map(|t| t.url.as_str()),
            DestinationType::Chime => self.chime.as_ref().map(|t| t.url.as_str()),
            DestinationType::CustomWebhook => {
                self.custom_webhook.as_ref().map(|t| t.url.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    Slack,
    Chime,
    CustomWebhook,
    Email,
    Sns,
    TestAction,
}

impl DestinationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::Slack => "slack",
            DestinationType::Chime => "chime",
            DestinationType::CustomWebhook => "custom_webhook",
            DestinationType::Email => "email",
            DestinationType::Sns => "sns",
            DestinationType::TestAction => "test_action",
        }
    }

    pub const ALL: [DestinationType; 6] = [
        DestinationType::Slack,
        DestinationType::Chime,
        DestinationType::CustomWebhook,
        DestinationType::Email,
        DestinationType::Sns,
        DestinationType::TestAction,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookTarget {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomWebhook {
    pub url: String,
    #[serde(default)]
    pub header_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTarget {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnsTarget {
    pub topic_arn: String,
    #[serde(default)]
    pub role_arn: Option<String>,
}

/// Resolved secure material a publisher needs for one destination.
/// Built by the context factory from the secure-settings snapshot; the
/// factory is the only thing the reload path mutates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationContext {
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
}
