//! Notification model
//!
//! The unit of delivery for the relay. Wire shape matches what the webhook
//! producers publish: camelCase keys, only `title` required, everything else
//! optional with defaults applied on ingest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Notification severity/kind.
///
/// Producers are not limited to the three well-known values; unknown strings
/// pass through untouched so a new producer category never fails decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    Success,
    Error,
    Other(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::Info => "info",
            NotificationType::Success => "success",
            NotificationType::Error => "error",
            NotificationType::Other(s) => s,
        }
    }
}

impl Default for NotificationType {
    fn default() -> Self {
        NotificationType::Info
    }
}

impl From<&str> for NotificationType {
    fn from(s: &str) -> Self {
        match s {
            "info" => NotificationType::Info,
            "success" => NotificationType::Success,
            "error" => NotificationType::Error,
            other => NotificationType::Other(other.to_string()),
        }
    }
}

impl Serialize for NotificationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NotificationType::from(s.as_str()))
    }
}

/// Notification as decoded from a broker message, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInput {
    #[serde(rename = "type", default)]
    pub kind: NotificationType,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub read: bool,

    /// Creation time; defaults to arrival time when the source event
    /// carries none.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Notification as persisted, carrying the store-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: NotificationType,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    pub read: bool,

    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Attach a store-assigned id to an input
    pub fn from_input(id: impl Into<String>, input: NotificationInput) -> Self {
        Self {
            id: id.into(),
            kind: input.kind,
            title: input.title,
            message: input.message,
            pr_number: input.pr_number,
            job_id: input.job_id,
            environment: input.environment,
            blueprint: input.blueprint,
            url: input.url,
            read: input.read,
            timestamp: input.timestamp,
        }
    }
}
