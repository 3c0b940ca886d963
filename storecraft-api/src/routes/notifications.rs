//! Store notifications feed

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::page_bounds,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use storecraft_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::notification::Notification,
};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationList {
    pub items: Vec<Notification>,
    pub unread: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<NotificationList>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let (limit, offset) = page_bounds(query.limit, query.offset);
    let items =
        Notification::list_by_tenant(&state.db, auth.tenant_id, query.unread_only, limit, offset)
            .await?;
    let unread = Notification::unread_count(&state.db, auth.tenant_id).await?;

    Ok(Json(NotificationList {
        items,
        unread,
        limit,
        offset,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UnreadCount>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let count = Notification::unread_count(&state.db, auth.tenant_id).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Notification>> {
    require_permission(&auth, ResourcePermission::Read)?;

    Notification::mark_read(&state.db, id, auth.tenant_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    require_permission(&auth, ResourcePermission::Read)?;

    let updated = Notification::mark_all_read(&state.db, auth.tenant_id).await?;
    tracing::debug!(tenant_id = %auth.tenant_id, updated, "Notifications marked read");

    Ok(Json(MarkAllReadResponse { updated }))
}
