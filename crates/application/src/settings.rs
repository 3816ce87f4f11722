use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use domain::destination::entity::{Destination, DestinationContext, DestinationType};
use domain::settings::{RunnerSettings, SecureDestinationSettings};
use ports::secondary::metrics_port::MetricsPort;

use crate::retry::RetryPolicy;

/// Single-writer atomic cell holding the current [`RunnerSettings`]
/// snapshot. Readers snapshot once per use and never hold a lock across
/// I/O; in-flight work keeps the snapshot it started with.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<ArcSwap<RunnerSettings>>,
}

impl SettingsHandle {
    pub fn new(settings: RunnerSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    pub fn snapshot(&self) -> Arc<RunnerSettings> {
        self.inner.load_full()
    }

    pub fn replace(&self, settings: RunnerSettings) {
        self.inner.store(Arc::new(settings));
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(RunnerSettings::default())
    }
}

/// Constant policy for alert-save bulk retries.
pub fn alert_save_policy(settings: &RunnerSettings) -> RetryPolicy {
    RetryPolicy::constant(
        Duration::from_millis(settings.alert_backoff_millis),
        settings.alert_backoff_count,
    )
}

/// Exponential policy for alert moves after monitor index/delete.
pub fn move_alerts_policy(settings: &RunnerSettings) -> RetryPolicy {
    RetryPolicy::exponential(
        Duration::from_millis(settings.move_alerts_backoff_millis),
        settings.move_alerts_backoff_count,
    )
}

/// Builds per-destination publish contexts from the secure-settings
/// snapshot. Thread-safe; only the reload path replaces the snapshot.
pub struct DestinationContextFactory {
    secure: ArcSwap<SecureDestinationSettings>,
}

impl DestinationContextFactory {
    pub fn new(secure: SecureDestinationSettings) -> Self {
        Self {
            secure: ArcSwap::from_pointee(secure),
        }
    }

    pub fn context_for(&self, destination: &Destination) -> DestinationContext {
        let secure = self.secure.load();
        match destination.dest_type {
            DestinationType::Email => DestinationContext {
                smtp_username: secure.email_username.clone(),
                smtp_password: secure.email_password.clone(),
            },
            _ => DestinationContext::default(),
        }
    }

    pub fn update(&self, secure: SecureDestinationSettings) {
        self.secure.store(Arc::new(secure));
    }
}

impl Default for DestinationContextFactory {
    fn default() -> Self {
        Self::new(SecureDestinationSettings::default())
    }
}

/// The settings-watcher's write side: validates and atomically publishes a
/// new settings snapshot. Runs started before `apply` finish on the old
/// snapshot, runs started after see the new one.
pub struct SettingsReloadService {
    handle: SettingsHandle,
    contexts: Arc<DestinationContextFactory>,
    metrics: Arc<dyn MetricsPort>,
}

impl SettingsReloadService {
    pub fn new(
        handle: SettingsHandle,
        contexts: Arc<DestinationContextFactory>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            handle,
            contexts,
            metrics,
        }
    }

    pub fn apply(&self, settings: RunnerSettings, secure: Option<SecureDestinationSettings>) {
        if settings.alert_backoff_count == 0 || settings.move_alerts_backoff_count == 0 {
            tracing::warn!("settings reload rejected: backoff counts must be positive");
            self.metrics.record_settings_reload("rejected");
            return;
        }

        if let Some(secure) = secure {
            self.contexts.update(secure);
        }
        self.handle.replace(settings);
        self.metrics.record_settings_reload("success");
        tracing::info!("runner settings reloaded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::settings::AwsSnsSettings;
    use ports::test_utils::NoopMetrics;

    #[test]
    fn snapshot_is_stable_across_replace() {
        let handle = SettingsHandle::default();
        let before = handle.snapshot();

        handle.replace(RunnerSettings {
            alert_backoff_millis: 999,
            ..RunnerSettings::default()
        });

        // The old snapshot is untouched; a fresh snapshot sees the update.
        assert_eq!(before.alert_backoff_millis, 50);
        assert_eq!(handle.snapshot().alert_backoff_millis, 999);
    }

    #[test]
    fn policies_derive_from_settings() {
        let settings = RunnerSettings {
            alert_backoff_millis: 75,
            alert_backoff_count: 4,
            move_alerts_backoff_millis: 300,
            move_alerts_backoff_count: 6,
            ..RunnerSettings::default()
        };

        let save = alert_save_policy(&settings);
        assert_eq!(save.initial_delay, Duration::from_millis(75));
        assert_eq!(save.max_attempts, 4);
        assert_eq!(save.delay_for(0), save.delay_for(3));

        let mv = move_alerts_policy(&settings);
        assert_eq!(mv.initial_delay, Duration::from_millis(300));
        assert_eq!(mv.max_attempts, 6);
        assert_eq!(mv.delay_for(1), Duration::from_millis(600));
    }

    #[test]
    fn reload_rejects_zero_attempt_budgets() {
        let handle = SettingsHandle::default();
        let service = SettingsReloadService::new(
            handle.clone(),
            Arc::new(DestinationContextFactory::default()),
            Arc::new(NoopMetrics),
        );

        service.apply(
            RunnerSettings {
                alert_backoff_count: 0,
                ..RunnerSettings::default()
            },
            None,
        );

        assert_eq!(handle.snapshot().alert_backoff_count, 3);
    }

    #[test]
    fn reload_replaces_settings_and_secure_material() {
        let handle = SettingsHandle::default();
        let contexts = Arc::new(DestinationContextFactory::default());
        let service =
            SettingsReloadService::new(handle.clone(), Arc::clone(&contexts), Arc::new(NoopMetrics));

        service.apply(
            RunnerSettings {
                destination_host_deny_list: vec!["10.0.0.1".to_string()],
                aws_sns: AwsSnsSettings {
                    enabled: true,
                    access_key: Some("AKID".to_string()),
                    secret_key: Some("SECRET".to_string()),
                },
                ..RunnerSettings::default()
            },
            Some(SecureDestinationSettings {
                email_username: Some("alerts".to_string()),
                email_password: Some("hunter2".to_string()),
            }),
        );

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.destination_host_deny_list, vec!["10.0.0.1"]);
        assert!(snapshot.aws_sns.enabled);

        let email_destination = domain::destination::entity::Destination {
            id: "d1".to_string(),
            name: "mail ops".to_string(),
            dest_type: DestinationType::Email,
            slack: None,
            chime: None,
            custom_webhook: None,
            email: Some(domain::destination::entity::EmailTarget {
                host: "smtp.example".to_string(),
                port: 587,
                from: "noreply@example".to_string(),
                recipients: vec!["oncall@example".to_string()],
            }),
            sns: None,
        };
        let ctx = contexts.context_for(&email_destination);
        assert_eq!(ctx.smtp_username.as_deref(), Some("alerts"));
    }

    #[test]
    fn non_email_destinations_get_empty_context() {
        let contexts = DestinationContextFactory::default();
        let destination = domain::destination::entity::Destination {
            id: "d1".to_string(),
            name: "ops slack".to_string(),
            dest_type: DestinationType::Slack,
            slack: Some(domain::destination::entity::WebhookTarget {
                url: "https://hooks.slack.example/x".to_string(),
            }),
            chime: None,
            custom_webhook: None,
            email: None,
            sns: None,
        };
        assert_eq!(contexts.context_for(&destination), DestinationContext::default());
    }
}
