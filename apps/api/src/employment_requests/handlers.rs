use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::access::{resolve_scope, Scope};
use crate::auth::AuthUser;
use crate::employment::load_scoped_employment;
use crate::employment_requests::workflow::{
    approval_effect, check_initiator, decide, raised_by_student, validate_proposal, RequestAction,
};
use crate::errors::AppError;
use crate::models::employment::{EmploymentRequestRow, EmploymentRow};
use crate::models::enums::{RequestKind, RequestStatus, Role};
use crate::notifications::{notify, notify_admins, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "r.created_at"),
    ("updated_at", "r.updated_at"),
    ("proposed_date", "r.proposed_date"),
];

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub kind: RequestKind,
    pub employment_id: Uuid,
    pub reason: Option<String>,
    pub proposed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RequestFilter {
    pub kind: Option<RequestKind>,
    pub status: Option<RequestStatus>,
    pub employment_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RequestPatch {
    pub action: String,
}

fn kind_title(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Resignation => "Resignation request",
        RequestKind::Termination => "Termination request",
        RequestKind::EarlyCompletion => "Early completion request",
        RequestKind::Extension => "Extension request",
    }
}

/// Notifies the side that did not raise the request.
async fn notify_decider(state: &AppState, employment: &EmploymentRow, request: &EmploymentRequestRow, kind: &'static str) {
    let template = NewNotification::new(employment.user_id, Role::Student, kind, kind_title(request.kind))
        .body(request.reason.clone().unwrap_or_default())
        .data(json!({ "request_id": request.id, "employment_id": employment.id }));
    match request.kind {
        RequestKind::Resignation | RequestKind::EarlyCompletion => {
            notify_company(&state.db, employment.company_id, template).await
        }
        RequestKind::Termination => notify_admins(&state.db, template).await,
        RequestKind::Extension => notify(&state.db, template).await,
    }
}

async fn notify_initiator(state: &AppState, employment: &EmploymentRow, request: &EmploymentRequestRow) {
    let template = NewNotification::new(
        employment.user_id,
        Role::Student,
        "employment_request_decided",
        format!("{} {}", kind_title(request.kind), request.status),
    )
    .data(json!({ "request_id": request.id, "employment_id": employment.id, "status": request.status }));
    if raised_by_student(request.kind) {
        notify(&state.db, template).await;
    } else {
        notify_company(&state.db, employment.company_id, template).await;
    }
}

async fn load_scoped(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(EmploymentRequestRow, EmploymentRow), AppError> {
    let request = sqlx::query_as::<_, EmploymentRequestRow>("SELECT * FROM employment_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Request"))?;
    let employment = load_scoped_employment(&state.db, user, request.employment_id).await?;
    Ok((request, employment))
}

/// POST /api/v1/employment-requests
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<EmploymentRequestRow>), AppError> {
    let employment = load_scoped_employment(&state.db, &user, req.employment_id).await?;
    check_initiator(req.kind, user.role)?;
    validate_proposal(req.kind, req.proposed_date, employment.end_date)?;

    let request = sqlx::query_as::<_, EmploymentRequestRow>(
        r#"
        INSERT INTO employment_requests
            (employment_id, kind, initiated_by, initiator_id, reason, proposed_date, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending')
        RETURNING *
        "#,
    )
    .bind(employment.id)
    .bind(req.kind)
    .bind(user.role)
    .bind(user.id)
    .bind(&req.reason)
    .bind(req.proposed_date)
    .fetch_one(&state.db)
    .await?;

    info!("{} request {} raised on employment {}", request.kind, request.id, employment.id);
    notify_decider(&state, &employment, &request, "employment_request_created").await;

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/employment-requests
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Page<EmploymentRequestRow>>, AppError> {
    let window = page.window(SORTABLE, "r.created_at DESC");
    let scope = resolve_scope(&state.db, &user).await?;
    if scope == Scope::Nothing {
        return Ok(Json(Page::empty(&window)));
    }

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        scope.push_filter(qb, "e.user_id", "e.company_id");
        if let Some(kind) = filter.kind {
            qb.push(" AND r.kind = ").push_bind(kind);
        }
        if let Some(status) = filter.status {
            qb.push(" AND r.status = ").push_bind(status);
        }
        if let Some(employment_id) = filter.employment_id {
            qb.push(" AND r.employment_id = ").push_bind(employment_id);
        }
    };
    const FROM: &str = " FROM employment_requests r JOIN employment_records e ON e.id = r.employment_id";
    let mut count = QueryBuilder::new(format!("SELECT COUNT(*){FROM}"));
    push_where(&mut count);
    let mut select = QueryBuilder::new(format!("SELECT r.*{FROM}"));
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// GET /api/v1/employment-requests/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EmploymentRequestRow>, AppError> {
    let (request, _) = load_scoped(&state, &user, id).await?;
    Ok(Json(request))
}

/// PATCH /api/v1/employment-requests/:id
pub async fn handle_patch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<RequestPatch>,
) -> Result<Json<EmploymentRequestRow>, AppError> {
    let (request, employment) = load_scoped(&state, &user, id).await?;
    let action = RequestAction::parse(&patch.action)?;
    let status = decide(&request, user.id, user.role, action)?;

    let mut tx = state.db.begin().await?;
    let updated = sqlx::query_as::<_, EmploymentRequestRow>(
        r#"
        UPDATE employment_requests SET
            status = $2, decided_by = $3, decided_at = now(), updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    if status == RequestStatus::Approved {
        let change = approval_effect(request.kind, employment.status, request.proposed_date, Utc::now());
        sqlx::query(
            r#"
            UPDATE employment_records SET
                status = COALESCE($2, status),
                end_date = COALESCE($3, end_date),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(employment.id)
        .bind(change.status)
        .bind(change.end_date)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("{} request {id} {} by {}", request.kind, action.name(), user.id);
    if action == RequestAction::Cancel {
        notify_decider(&state, &employment, &updated, "employment_request_cancelled").await;
    } else {
        notify_initiator(&state, &employment, &updated).await;
    }

    Ok(Json(updated))
}
