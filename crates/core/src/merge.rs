use crate::models::{JobSettings, Webhook, WebhookNotifications};

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookMerge {
    /// `on_failure` already references the webhook; nothing to write.
    AlreadyConfigured,
    /// Settings to write back, with the webhook appended to `on_failure`.
    Updated(JobSettings),
}

/// Add `webhook` to the failure notifications of `settings`.
///
/// Existing entries are kept in order. A webhook configuration without an
/// `on_failure` list is treated as an empty list.
pub fn merge_failure_webhook(settings: &JobSettings, webhook: &Webhook) -> WebhookMerge {
    let webhook_notifications = match &settings.webhook_notifications {
        None => WebhookNotifications { on_failure: Some(vec![webhook.clone()]), ..Default::default() },
        Some(existing) => {
            let on_failure = existing.on_failure.as_deref().unwrap_or_default();
            if on_failure.contains(webhook) {
                return WebhookMerge::AlreadyConfigured;
            }
            let mut on_failure = on_failure.to_vec();
            on_failure.push(webhook.clone());
            WebhookNotifications { on_failure: Some(on_failure), extra: existing.extra.clone() }
        }
    };
    WebhookMerge::Updated(JobSettings {
        webhook_notifications: Some(webhook_notifications),
        ..settings.clone()
    })
}
