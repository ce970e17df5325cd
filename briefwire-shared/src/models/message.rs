use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::timestamp::Timestamp;

/// A chat message as stored and returned by the ingestion API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    /// Per-conversation position, assigned by the server. Gapless per writer
    /// order; two messages in one conversation never share a seq.
    pub seq: i64,
    /// Caller-supplied idempotency key. Retrying with the same key returns
    /// the original row.
    pub client_id: String,
    pub sender_id: Uuid,
    pub content: String,
    pub server_ts: Timestamp,
    pub created_at: Timestamp,
}

/// Request body for posting a message into a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestMessageRequest {
    pub client_id: String,
    pub content: String,
    /// Participants explicitly mentioned in the message. Recipients who opted
    /// into mentions-only delivery are notified only when listed here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Uuid>,
}

/// A page of conversation messages ordered by seq.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    pub items: Vec<MessageView>,
    pub latest_seq: i64,
}

/// Request body for advancing a read cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceReadStateRequest {
    pub seq: i64,
}

/// Sequence-diff unread count for one conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUnreadResponse {
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_request_mentions_default_to_empty() {
        let raw = r#"{"clientId":"draft-17","content":"Filed the motion."}"#;
        let request: IngestMessageRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.client_id, "draft-17");
        assert!(request.mentions.is_empty());
    }
}
