// src/routes/notification_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, NotificationRow, NotificationStatus},
    notify::event::EventType,
    store::{NotificationQuery, NotificationStore as _},
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread_count", get(get_unread_count))
        .route("/notifications/read_all", post(mark_all_read))
        .route("/notifications/{notification_id}/read", post(mark_read))
        .route("/notifications/{notification_id}/archive", post(mark_archived))
}

/* ============================================================
   GET /notifications
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<NotificationStatus>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
}

#[derive(Debug, Serialize)]
pub struct NotificationsResponse {
    pub data: NotificationsData,
}

#[derive(Debug, Serialize)]
pub struct NotificationsData {
    pub notifications: Vec<NotificationRow>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

fn clamp_paging(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let (page, limit) = clamp_paging(q.page, q.limit);

    let result = state
        .notifications
        .find_for_principal(
            auth.user_id,
            &NotificationQuery {
                page,
                limit,
                status: q.status,
                event_type: q.event_type.map(|t| t.as_str().to_string()),
            },
        )
        .await?;

    let total_pages = if result.total == 0 {
        0
    } else {
        (result.total + limit - 1) / limit
    };

    Ok(Json(NotificationsResponse {
        data: NotificationsData {
            notifications: result.notifications,
            pagination: Pagination {
                page,
                limit,
                total: result.total,
                total_pages,
            },
        },
    }))
}

/* ============================================================
   GET /notifications/unread_count
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub data: UnreadCountData,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountData {
    pub unread: i64,
}

pub async fn get_unread_count(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread = state.notifications.count_unread(auth.user_id).await?;
    Ok(Json(UnreadCountResponse {
        data: UnreadCountData { unread },
    }))
}

/* ============================================================
   Read / archive mutations, scoped to the requesting principal
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub data: OkData,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let updated = state
        .notifications
        .mark_read(notification_id, auth.user_id)
        .await?;
    if !updated {
        return Err(ApiError::NotFound("notification not found".into()));
    }
    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

pub async fn mark_archived(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ApiError> {
    let updated = state
        .notifications
        .mark_archived(notification_id, auth.user_id)
        .await?;
    if !updated {
        return Err(ApiError::NotFound("notification not found".into()));
    }
    Ok(Json(OkResponse {
        data: OkData { ok: true },
    }))
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub data: MarkAllReadData,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadData {
    pub ok: bool,
    pub updated_count: i64,
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(MarkAllReadResponse {
        data: MarkAllReadData {
            ok: true,
            updated_count: updated as i64,
        },
    }))
}
