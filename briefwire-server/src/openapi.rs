#![allow(clippy::needless_for_each)] // Derive macro emits a for_each internally

use shared::models::{
    AdvanceReadStateRequest, ConversationSummary, ConversationUnreadResponse, EntityKind,
    EntityRef, ErrorResponse, IngestMessageRequest, MarkAllReadResponse, MessageListResponse,
    MessageView, NotificationCategory, NotificationListResponse, NotificationPush,
    NotificationView, ParticipantRole, ParticipantView, Timestamp, UnreadCountResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Briefwire API",
        version = "1.0.0",
        description = "Messaging ingestion, read-state, and notification delivery"
    ),
    paths(
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::unread_count,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::mark_unread,
        crate::handlers::notifications::mark_all_read,
        crate::handlers::messages::get_conversation,
        crate::handlers::messages::post_message,
        crate::handlers::messages::list_messages,
        crate::handlers::messages::advance_read_state,
        crate::handlers::messages::conversation_unread,
        crate::handlers::streaming::sse_handler,
    ),
    components(
        schemas(
            AdvanceReadStateRequest,
            ConversationSummary,
            ConversationUnreadResponse,
            EntityKind,
            EntityRef,
            ErrorResponse,
            IngestMessageRequest,
            MarkAllReadResponse,
            MessageListResponse,
            MessageView,
            NotificationCategory,
            NotificationListResponse,
            NotificationPush,
            NotificationView,
            ParticipantRole,
            ParticipantView,
            Timestamp,
            UnreadCountResponse,
        )
    ),
    tags(
        (name = "Messages", description = "Message ingestion and read-state endpoints"),
        (name = "Notifications", description = "Inbox and streaming endpoints")
    )
)]
pub struct ApiDoc;
