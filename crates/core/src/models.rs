use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type JobId = u64;

/// A job as returned by the jobs list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Job {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<JobSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn name(&self) -> Option<&str> { self.settings.as_ref()?.name.as_deref() }
}

/// Job settings. Anything this tool doesn't touch is kept in `extra` so that
/// writing the settings back doesn't drop it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct JobSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_notifications: Option<WebhookNotifications>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WebhookNotifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Vec<Webhook>>,
    /// `on_start`, `on_success`, `on_duration_warning_threshold_exceeded`, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to a notification destination. Equal when the IDs are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Webhook {
    pub id: String,
}

impl Webhook {
    pub fn new(id: impl Into<String>) -> Self { Self { id: id.into() } }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationDestination {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_type: Option<String>,
}

/// SCIM service principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    CanView,
}

/// Level granted to the Monte Carlo service principal.
pub const VIEWER_PERMISSION: PermissionLevel = PermissionLevel::CanView;

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CanView => "Can View",
        })
    }
}

/// One entry of a job access control list update. Exactly one principal field is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobAccessControlRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    pub permission_level: PermissionLevel,
}

impl JobAccessControlRequest {
    pub fn service_principal(application_id: impl Into<String>, level: PermissionLevel) -> Self {
        Self {
            service_principal_name: Some(application_id.into()),
            user_name: None,
            group_name: None,
            permission_level: level,
        }
    }
}
