use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::timestamp::Timestamp;

/// Wire version of the SSE push payload. Bumped when the frame shape changes;
/// consumers ignore frames with a version they do not understand.
pub const PUSH_SCHEMA_VERSION: u8 = 1;

/// Notification classification governing routing and channel policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Message,
    System,
    Payment,
    Intake,
    Matter,
}

impl NotificationCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 5] = [
        Self::Message,
        Self::System,
        Self::Payment,
        Self::Intake,
        Self::Matter,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::System => "system",
            Self::Payment => "payment",
            Self::Intake => "intake",
            Self::Matter => "matter",
        }
    }
}

impl TryFrom<&str> for NotificationCategory {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "message" => Ok(Self::Message),
            "system" => Ok(Self::System),
            "payment" => Ok(Self::Payment),
            "intake" => Ok(Self::Intake),
            "matter" => Ok(Self::Matter),
            _ => Err("invalid notification category"),
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery channel for a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    InApp,
    Push,
    Email,
}

impl DeliveryChannel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InApp => "in_app",
            Self::Push => "push",
            Self::Email => "email",
        }
    }
}

impl TryFrom<&str> for DeliveryChannel {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "in_app" => Ok(Self::InApp),
            "push" => Ok(Self::Push),
            "email" => Ok(Self::Email),
            _ => Err("invalid delivery channel"),
        }
    }
}

/// Kind of domain entity a notification points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Conversation,
    Matter,
    Invoice,
    IntakeForm,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Matter => "matter",
            Self::Invoice => "invoice",
            Self::IntakeForm => "intake_form",
        }
    }
}

impl TryFrom<&str> for EntityKind {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "conversation" => Ok(Self::Conversation),
            "matter" => Ok(Self::Matter),
            "invoice" => Ok(Self::Invoice),
            "intake_form" => Ok(Self::IntakeForm),
            _ => Err("invalid entity kind"),
        }
    }
}

/// Typed reference to the entity a notification is about. Set at creation
/// time; clients never have to parse ids out of links.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
}

/// A single notification row as returned by the inbox API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<Timestamp>,
}

impl NotificationView {
    #[must_use]
    pub const fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

/// One page of the inbox listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub items: Vec<NotificationView>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Unread row count for one category (or all categories).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// Result of a bulk mark-read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: i64,
}

/// Payload of an `event: notification` SSE frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPush {
    /// Payload schema version; see [`PUSH_SCHEMA_VERSION`].
    #[serde(rename = "v", default = "default_push_version")]
    pub version: u8,
    pub notification_id: Uuid,
    pub category: NotificationCategory,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

const fn default_push_version() -> u8 {
    PUSH_SCHEMA_VERSION
}

impl NotificationPush {
    #[must_use]
    pub fn from_view(view: &NotificationView) -> Self {
        Self {
            version: PUSH_SCHEMA_VERSION,
            notification_id: view.id,
            category: view.category,
            created_at: view.created_at.clone(),
            title: Some(view.title.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn category_round_trips_through_str() {
        for category in NotificationCategory::ALL {
            assert_eq!(
                NotificationCategory::try_from(category.as_str()),
                Ok(category)
            );
        }
        assert!(NotificationCategory::try_from("marketing").is_err());
    }

    #[test]
    fn push_payload_uses_camel_case_and_version_tag() {
        let push = NotificationPush {
            version: PUSH_SCHEMA_VERSION,
            notification_id: Uuid::new_v4(),
            category: NotificationCategory::Message,
            created_at: Timestamp(Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()),
            title: None,
        };

        let json = serde_json::to_value(&push).unwrap();
        assert_eq!(json["v"], 1);
        assert_eq!(json["category"], "message");
        assert!(json.get("notificationId").is_some());
        assert!(json.get("title").is_none());
    }

    #[test]
    fn push_payload_defaults_missing_version_to_current() {
        let raw = r#"{"notificationId":"8f9f1c1e-8f6a-4f7e-9f0b-0d8f54c21c11","category":"payment","createdAt":"2025-06-02T08:00:00Z"}"#;
        let push: NotificationPush = serde_json::from_str(raw).unwrap();
        assert_eq!(push.version, PUSH_SCHEMA_VERSION);
        assert_eq!(push.category, NotificationCategory::Payment);
    }

    #[test]
    fn unknown_category_is_rejected_at_decode_time() {
        let raw = r#"{"v":1,"notificationId":"8f9f1c1e-8f6a-4f7e-9f0b-0d8f54c21c11","category":"carrier_pigeon","createdAt":"2025-06-02T08:00:00Z"}"#;
        assert!(serde_json::from_str::<NotificationPush>(raw).is_err());
    }
}
