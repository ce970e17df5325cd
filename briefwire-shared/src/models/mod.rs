pub mod conversation;
pub mod errors;
pub mod message;
pub mod notification;
pub mod timestamp;

pub use conversation::{ConversationSummary, ParticipantRole, ParticipantView};
pub use errors::ErrorResponse;
pub use message::{
    AdvanceReadStateRequest, ConversationUnreadResponse, IngestMessageRequest, MessageListResponse,
    MessageView,
};
pub use notification::{
    DeliveryChannel, EntityKind, EntityRef, MarkAllReadResponse, NotificationCategory,
    NotificationListResponse, NotificationPush, NotificationView, PUSH_SCHEMA_VERSION,
    UnreadCountResponse,
};
pub use timestamp::Timestamp;
