use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::access::{company_owned_by, resolve_scope, Scope};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::messaging::{participant_of, Participant};
use crate::models::enums::Role;
use crate::models::messaging::{MessageRow, ThreadRow};
use crate::notifications::{notify, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::users::repo;

#[derive(Debug, Deserialize)]
pub struct OpenThreadRequest {
    pub company_id: Uuid,
    /// Defaults to the caller when a student opens the thread.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

async fn load_for_participant(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(ThreadRow, Participant), AppError> {
    let thread = sqlx::query_as::<_, ThreadRow>("SELECT * FROM threads WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Thread"))?;
    let own_company = match user.role {
        Role::Company => company_owned_by(&state.db, user.id).await?.map(|c| c.id),
        _ => None,
    };
    let participant = participant_of(&thread, user, own_company).ok_or_else(AppError::forbidden)?;
    Ok((thread, participant))
}

/// POST /api/v1/threads
pub async fn handle_open_thread(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OpenThreadRequest>,
) -> Result<Json<ThreadRow>, AppError> {
    let student_id = match user.role {
        Role::Student => req.user_id.unwrap_or(user.id),
        _ => req
            .user_id
            .ok_or_else(|| AppError::Validation("user_id is required".to_string()))?,
    };

    let allowed = match user.role {
        Role::Admin => true,
        Role::Student => student_id == user.id,
        Role::Company => company_owned_by(&state.db, user.id)
            .await?
            .is_some_and(|c| c.id == req.company_id),
    };
    if !allowed {
        return Err(AppError::forbidden());
    }

    let company_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM companies WHERE id = $1)")
        .bind(req.company_id)
        .fetch_one(&state.db)
        .await?;
    if !company_exists {
        return Err(AppError::not_found("Company"));
    }
    repo::find_by_id(&state.db, student_id)
        .await?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| AppError::Validation("Thread participant must be a student".to_string()))?;

    // The no-op update makes RETURNING yield the existing row on conflict.
    let thread = sqlx::query_as::<_, ThreadRow>(
        r#"
        INSERT INTO threads (company_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (company_id, user_id) DO UPDATE SET company_id = EXCLUDED.company_id
        RETURNING *
        "#,
    )
    .bind(req.company_id)
    .bind(student_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(thread))
}

/// GET /api/v1/threads
pub async fn handle_list_threads(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ThreadRow>>, AppError> {
    let window = page.window(&[], "COALESCE(last_message_at, created_at) DESC");
    let scope = resolve_scope(&state.db, &user).await?;
    if scope == Scope::Nothing {
        return Ok(Json(Page::empty(&window)));
    }

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        scope.push_filter(qb, "user_id", "company_id");
    };
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM threads");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM threads");
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// GET /api/v1/threads/:id/messages
pub async fn handle_list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<MessageRow>>, AppError> {
    load_for_participant(&state, &user, id).await?;
    let window = page.window(&[], "created_at ASC");

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM messages WHERE thread_id = ");
    count.push_bind(id);
    let mut select = QueryBuilder::new("SELECT * FROM messages WHERE thread_id = ");
    select.push_bind(id);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// POST /api/v1/threads/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageRow>), AppError> {
    let (thread, participant) = load_for_participant(&state, &user, id).await?;
    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Message body is required".to_string()));
    }

    let mut tx = state.db.begin().await?;
    let message = sqlx::query_as::<_, MessageRow>(
        "INSERT INTO messages (thread_id, sender_user_id, body) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(id)
    .bind(user.id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("UPDATE threads SET last_message_at = $2 WHERE id = $1")
        .bind(id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Message {} sent in thread {id}", message.id);
    let template = NewNotification::new(thread.user_id, Role::Student, "message_received", "New message")
        .body(body.chars().take(140).collect::<String>())
        .data(json!({ "thread_id": id, "message_id": message.id }));
    match participant {
        Participant::Student => notify_company(&state.db, thread.company_id, template).await,
        Participant::Company => notify(&state.db, template).await,
    }

    Ok((StatusCode::CREATED, Json(message)))
}
