use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use crate::{
    config::RECENT_NOTIFICATIONS_LIMIT,
    error::AppError,
    models::notification::{Notification, NotificationListResponse, NotificationView},
    utils::{jwt::AuthUser, time::time_ago},
};

/// The caller's most recent notifications and unread count.
pub async fn list_notifications(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(user.id)
    .bind(RECENT_NOTIFICATIONS_LIMIT)
    .fetch_all(&pool)
    .await?;

    let unread_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read")
            .bind(user.id)
            .fetch_one(&pool)
            .await?;

    let now = Utc::now();
    let notifications = notifications
        .into_iter()
        .map(|notification| NotificationView {
            time_ago: time_ago(notification.created_at, now),
            notification,
        })
        .collect();

    Ok(Json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

/// Marks one of the caller's notifications as read.
pub async fn mark_read(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let updated = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(json!({"success": true})))
}

/// Marks every unread notification of the caller as read.
pub async fn mark_all_read(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let marked_count = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
        .bind(user.id)
        .execute(&pool)
        .await?
        .rows_affected();

    Ok(Json(json!({"success": true, "marked_count": marked_count})))
}
