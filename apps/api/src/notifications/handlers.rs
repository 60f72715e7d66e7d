use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::notification::NotificationRow;
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedCount {
    pub updated: u64,
}

/// GET /api/v1/notifications
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Page<NotificationRow>>, AppError> {
    let window = page.window(&[("created_at", "created_at")], "created_at DESC");

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE recipient_user_id = ").push_bind(user.id);
        if filter.unread_only {
            qb.push(" AND read_at IS NULL");
        }
    };
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM notifications");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM notifications");
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// GET /api/v1/notifications/unread-count
pub async fn handle_unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UnreadCount>, AppError> {
    let unread: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE recipient_user_id = $1 AND read_at IS NULL",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(UnreadCount { unread }))
}

/// PATCH /api/v1/notifications/:id/read
pub async fn handle_mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRow>, AppError> {
    let row = sqlx::query_as::<_, NotificationRow>(
        r#"
        UPDATE notifications SET read_at = COALESCE(read_at, now())
        WHERE id = $1 AND recipient_user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Notification"))?;
    Ok(Json(row))
}

/// POST /api/v1/notifications/read-all
pub async fn handle_mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MarkedCount>, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = now() WHERE recipient_user_id = $1 AND read_at IS NULL",
    )
    .bind(user.id)
    .execute(&state.db)
    .await?;
    Ok(Json(MarkedCount {
        updated: result.rows_affected(),
    }))
}
