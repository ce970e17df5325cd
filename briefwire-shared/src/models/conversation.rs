use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::timestamp::Timestamp;

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Attorney,
    Staff,
    Client,
}

impl ParticipantRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attorney => "attorney",
            Self::Staff => "staff",
            Self::Client => "client",
        }
    }
}

impl TryFrom<&str> for ParticipantRole {
    type Error = &'static str;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "attorney" => Ok(Self::Attorney),
            "staff" => Ok(Self::Staff),
            "client" => Ok(Self::Client),
            _ => Err("invalid participant role"),
        }
    }
}

/// One participant of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: Uuid,
    pub role: ParticipantRole,
    /// When set, message notifications reach this participant only if they
    /// are mentioned.
    pub mentions_only: bool,
}

/// Conversation header with its membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    /// Cached maximum message seq; equals the highest committed seq.
    pub latest_seq: i64,
    /// Incremented on participant add/remove; invalidates cached membership.
    pub membership_version: i32,
    pub created_at: Timestamp,
    pub participants: Vec<ParticipantView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_role_round_trips_through_str() {
        for role in [
            ParticipantRole::Attorney,
            ParticipantRole::Staff,
            ParticipantRole::Client,
        ] {
            assert_eq!(ParticipantRole::try_from(role.as_str()), Ok(role));
        }
        assert!(ParticipantRole::try_from("paralegal").is_err());
    }
}
