use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use shared::config::server::Config;
use shared::models::{
    AdvanceReadStateRequest, ConversationSummary, ConversationUnreadResponse, EntityKind,
    EntityRef, ErrorResponse, IngestMessageRequest, MessageListResponse, MessageView,
    NotificationCategory,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    app_state::AppState,
    handlers::notifications::{require_pool, require_user},
    handlers::streaming::SharedHub,
    http::error::AppResult,
    middleware::request_context::RequestContext,
    services::delivery::DeliveryQueue,
    services::fanout::{FanoutService, NotificationEvent},
    services::ingest::MessageIngestService,
    services::read_state::ReadStateService,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations/{id}", get(get_conversation))
        .route(
            "/conversations/{id}/messages",
            post(post_message).get(list_messages),
        )
        .route("/conversations/{id}/read", post(advance_read_state))
        .route("/conversations/{id}/unread", get(conversation_unread))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageListParams {
    after_seq: Option<i64>,
    limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/conversations/{id}/messages",
    request_body = IngestMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageView),
        (status = 200, description = "Idempotent replay of an earlier submission", body = MessageView),
        (status = 403, description = "Sender is not a participant", body = ErrorResponse),
        (status = 409, description = "Sequence allocation kept conflicting", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, config, context, hub, queue, request))]
pub async fn post_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Extension(hub): Extension<SharedHub>,
    Extension(queue): Extension<Arc<dyn DeliveryQueue>>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<IngestMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let sender_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = MessageIngestService::new(pool.clone(), config.ingest.clone());

    let outcome = service
        .ingest(conversation_id, sender_id, &request)
        .await?;

    if outcome.created {
        // Fan out to the other participants. Notification delivery is
        // best-effort; a failure here must not fail the ingest.
        let fanout = FanoutService::new(pool, queue);
        if let Err(err) = publish_message_event(
            &service,
            &fanout,
            &hub,
            &outcome.message,
            &request.mentions,
        )
        .await
        {
            warn!(conversation = %conversation_id, "message fan-out failed: {err}");
        }
    }

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.message)))
}

async fn publish_message_event(
    service: &MessageIngestService,
    fanout: &FanoutService,
    hub: &SharedHub,
    message: &MessageView,
    mentions: &[Uuid],
) -> AppResult<()> {
    let recipients = service
        .eligible_message_recipients(message.conversation_id, message.sender_id, mentions)
        .await?;
    if recipients.is_empty() {
        return Ok(());
    }

    let header = service.conversation_header(message.conversation_id).await?;

    let excerpt: String = message.content.chars().take(140).collect();
    let event = NotificationEvent {
        org_id: header.org_id,
        category: NotificationCategory::Message,
        title: format!("New message in {}", header.title),
        body: excerpt,
        link: Some(format!("/conversations/{}", message.conversation_id)),
        entity: Some(EntityRef {
            entity_type: EntityKind::Conversation,
            entity_id: message.conversation_id,
        }),
        metadata: json!({ "seq": message.seq, "senderId": message.sender_id }),
        recipients,
    };

    fanout.publish(&event, hub).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    params(
        ("afterSeq" = Option<i64>, Query, description = "Return messages strictly after this seq"),
        ("limit" = Option<i64>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "Messages ordered by seq", body = MessageListResponse),
        (status = 403, description = "Reader is not a participant", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, config, context, params))]
pub async fn list_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<MessageListParams>,
) -> AppResult<Json<MessageListResponse>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = MessageIngestService::new(pool, config.ingest.clone());

    let response = service
        .list_messages(conversation_id, user_id, params.after_seq, params.limit)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/conversations/{id}/read",
    request_body = AdvanceReadStateRequest,
    responses(
        (status = 204, description = "Cursor advanced (or already past the given seq)"),
        (status = 403, description = "User is not a participant", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, context, payload))]
pub async fn advance_read_state(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
    Json(payload): Json<AdvanceReadStateRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = ReadStateService::new(pool);

    service.advance(conversation_id, user_id, payload.seq).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/conversations/{id}",
    responses(
        (status = 200, description = "Conversation header and membership", body = ConversationSummary),
        (status = 403, description = "User is not a participant", body = ErrorResponse),
        (status = 404, description = "Unknown conversation", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, config, context))]
pub async fn get_conversation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ConversationSummary>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = MessageIngestService::new(pool, config.ingest.clone());

    let summary = service
        .conversation_summary(conversation_id, user_id)
        .await?;
    Ok(Json(summary))
}

#[utoipa::path(
    get,
    path = "/conversations/{id}/unread",
    responses(
        (status = 200, description = "Sequence-diff unread count", body = ConversationUnreadResponse),
        (status = 403, description = "User is not a participant", body = ErrorResponse)
    ),
    tag = "Messages"
)]
#[instrument(skip(app_state, context))]
pub async fn conversation_unread(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(context): Extension<RequestContext>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<ConversationUnreadResponse>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = ReadStateService::new(pool);

    let unread = service.unread_count(conversation_id, user_id).await?;
    Ok(Json(ConversationUnreadResponse { unread }))
}
