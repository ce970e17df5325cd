use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    routing::{get, post},
};
use serde::Deserialize;
use shared::models::{
    ErrorResponse, MarkAllReadResponse, NotificationCategory, NotificationListResponse,
    NotificationView, UnreadCountResponse,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    middleware::request_context::RequestContext,
    services::CoreError,
    services::inbox::{InboxService, ListQuery},
};
use shared::config::server::Config;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}/unread", post(mark_unread))
        .route("/notifications/read-all", post(mark_all_read))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListParams {
    category: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
    #[serde(default)]
    unread_only: bool,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct CategoryParams {
    category: Option<String>,
}

fn parse_category(raw: Option<&str>) -> AppResult<Option<NotificationCategory>> {
    raw.map(|value| {
        NotificationCategory::try_from(value)
            .map_err(|_| ApiError::validation(format!("unknown category '{value}'")))
    })
    .transpose()
}

pub(crate) fn require_user(context: &RequestContext) -> AppResult<Uuid> {
    context
        .user_id
        .ok_or_else(|| CoreError::Auth("session required".into()).into())
}

pub(crate) fn require_pool(app_state: &AppState) -> AppResult<sqlx::PgPool> {
    app_state
        .pool
        .clone()
        .ok_or_else(|| ApiError::internal_server_error("database is not configured"))
}

#[utoipa::path(
    get,
    path = "/notifications",
    params(
        ("category" = Option<String>, Query, description = "Restrict to one category"),
        ("cursor" = Option<String>, Query, description = "Opaque pagination cursor"),
        ("limit" = Option<i64>, Query, description = "Page size"),
        ("unreadOnly" = Option<bool>, Query, description = "Only unread rows")
    ),
    responses(
        (status = 200, description = "One inbox page", body = NotificationListResponse),
        (status = 400, description = "Invalid cursor, category, or limit", body = ErrorResponse)
    ),
    tag = "Notifications"
)]
#[instrument(skip(app_state, config, context, params))]
pub async fn list_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<NotificationListResponse>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = InboxService::new(pool, config.notifications.clone());

    let query = ListQuery {
        category: parse_category(params.category.as_deref())?,
        cursor: params.cursor,
        limit: params.limit,
        unread_only: params.unread_only,
    };

    let response = service.list(user_id, &query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    params(
        ("category" = Option<String>, Query, description = "Restrict to one category")
    ),
    responses(
        (status = 200, description = "Unread row count", body = UnreadCountResponse),
        (status = 400, description = "Unknown category", body = ErrorResponse)
    ),
    tag = "Notifications"
)]
#[instrument(skip(app_state, config, context, params))]
pub async fn unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Query(params): Query<CategoryParams>,
) -> AppResult<Json<UnreadCountResponse>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = InboxService::new(pool, config.notifications.clone());

    let category = parse_category(params.category.as_deref())?;
    let response = service.unread_count(user_id, category).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    responses(
        (status = 200, description = "Notification marked read", body = NotificationView),
        (status = 404, description = "Unknown notification", body = ErrorResponse)
    ),
    tag = "Notifications"
)]
#[instrument(skip(app_state, config, context))]
pub async fn mark_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<NotificationView>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = InboxService::new(pool, config.notifications.clone());

    let view = service.mark_read(user_id, id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/unread",
    responses(
        (status = 200, description = "Notification marked unread", body = NotificationView),
        (status = 404, description = "Unknown notification", body = ErrorResponse)
    ),
    tag = "Notifications"
)]
#[instrument(skip(app_state, config, context))]
pub async fn mark_unread(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<NotificationView>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = InboxService::new(pool, config.notifications.clone());

    let view = service.mark_unread(user_id, id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    params(
        ("category" = Option<String>, Query, description = "Restrict to one category")
    ),
    responses(
        (status = 200, description = "Bulk mark complete", body = MarkAllReadResponse),
        (status = 400, description = "Unknown category", body = ErrorResponse)
    ),
    tag = "Notifications"
)]
#[instrument(skip(app_state, config, context, params))]
pub async fn mark_all_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(context): Extension<RequestContext>,
    Query(params): Query<CategoryParams>,
) -> AppResult<Json<MarkAllReadResponse>> {
    let user_id = require_user(&context)?;
    let pool = require_pool(&app_state)?;
    let service = InboxService::new(pool, config.notifications.clone());

    let category = parse_category(params.category.as_deref())?;
    let response = service.mark_all_read(user_id, category).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_category_accepts_known_and_rejects_unknown() {
        assert_eq!(
            parse_category(Some("payment")).unwrap(),
            Some(NotificationCategory::Payment)
        );
        assert_eq!(parse_category(None).unwrap(), None);
        assert!(parse_category(Some("newsletter")).is_err());
    }

    #[test]
    fn require_user_rejects_anonymous_context() {
        let context = RequestContext {
            request_id: "req-1".into(),
            user_id: None,
        };
        assert!(require_user(&context).is_err());

        let context = RequestContext {
            request_id: "req-2".into(),
            user_id: Some(Uuid::new_v4()),
        };
        assert!(require_user(&context).is_ok());
    }
}
