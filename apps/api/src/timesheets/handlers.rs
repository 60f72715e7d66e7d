use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as SqlJson;
use sqlx::{Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::access::{resolve_scope, Scope};
use crate::auth::AuthUser;
use crate::employment::{load_employment, load_scoped_employment};
use crate::errors::AppError;
use crate::models::employment::{EmploymentRow, TimesheetItem, TimesheetRow};
use crate::models::enums::{Role, TimesheetStatus};
use crate::notifications::{notify, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::timesheets::workflow::{
    can_edit, next_status, total_hours, validate_items, validate_period, TimesheetAction,
};
use crate::timesheets::SELECT_SCOPED;

const SORTABLE: &[(&str, &str)] = &[
    ("period_start", "t.period_start"),
    ("created_at", "t.created_at"),
    ("updated_at", "t.updated_at"),
];

#[derive(Debug, Deserialize)]
pub struct CreateTimesheetRequest {
    pub employment_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<TimesheetItem>,
}

#[derive(Debug, Deserialize)]
pub struct TimesheetFilter {
    pub employment_id: Option<Uuid>,
    pub status: Option<TimesheetStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimesheetPatch {
    pub action: Option<String>,
    pub items: Option<Vec<TimesheetItem>>,
    pub feedback: Option<String>,
}

async fn load_scoped(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<(TimesheetRow, EmploymentRow), AppError> {
    let sheet = sqlx::query_as::<_, TimesheetRow>("SELECT * FROM timesheets WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Timesheet"))?;
    let employment = load_scoped_employment(&state.db, user, sheet.employment_id).await?;
    Ok((sheet, employment))
}

/// POST /api/v1/timesheets
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateTimesheetRequest>,
) -> Result<(StatusCode, Json<TimesheetRow>), AppError> {
    let employment = load_employment(&state.db, req.employment_id).await?;
    if user.role != Role::Student || employment.user_id != user.id {
        return Err(AppError::Forbidden(
            "Only the employed student can create timesheets".to_string(),
        ));
    }
    validate_period(req.period_start, req.period_end)?;
    validate_items(&req.items)?;

    let total = total_hours(&req.items);
    let sheet = sqlx::query_as::<_, TimesheetRow>(
        r#"
        INSERT INTO timesheets (employment_id, period_start, period_end, cadence, items, total_hours, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'draft')
        RETURNING *
        "#,
    )
    .bind(employment.id)
    .bind(req.period_start)
    .bind(req.period_end)
    .bind(&employment.cadence)
    .bind(SqlJson(&req.items))
    .bind(total)
    .fetch_one(&state.db)
    .await?;

    info!("Timesheet {} created for employment {}", sheet.id, employment.id);
    Ok((StatusCode::CREATED, Json(sheet)))
}

/// GET /api/v1/timesheets
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<TimesheetFilter>,
) -> Result<Json<Page<TimesheetRow>>, AppError> {
    let window = page.window(SORTABLE, "t.period_start DESC");
    let scope = resolve_scope(&state.db, &user).await?;
    if scope == Scope::Nothing {
        return Ok(Json(Page::empty(&window)));
    }

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        scope.push_filter(qb, "e.user_id", "e.company_id");
        if let Some(employment_id) = filter.employment_id {
            qb.push(" AND t.employment_id = ").push_bind(employment_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
    };
    let mut count = QueryBuilder::new(
        "SELECT COUNT(*) FROM timesheets t JOIN employment_records e ON e.id = t.employment_id",
    );
    push_where(&mut count);
    let mut select = QueryBuilder::new(SELECT_SCOPED);
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// GET /api/v1/timesheets/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TimesheetRow>, AppError> {
    let (sheet, _) = load_scoped(&state, &user, id).await?;
    Ok(Json(sheet))
}

/// PATCH /api/v1/timesheets/:id
///
/// Without `action` the student edits the items of a draft or rejected sheet.
pub async fn handle_patch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<TimesheetPatch>,
) -> Result<Json<TimesheetRow>, AppError> {
    let (sheet, employment) = load_scoped(&state, &user, id).await?;

    let Some(raw_action) = patch.action.as_deref() else {
        if user.id != employment.user_id {
            return Err(AppError::Forbidden(
                "Only the employed student can edit timesheets".to_string(),
            ));
        }
        if !can_edit(sheet.status) {
            return Err(AppError::Validation(
                "Only draft or rejected timesheets can be edited".to_string(),
            ));
        }
        let items = patch.items.unwrap_or_else(|| sheet.items.0.clone());
        validate_items(&items)?;
        let updated = sqlx::query_as::<_, TimesheetRow>(
            r#"
            UPDATE timesheets SET items = $2, total_hours = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(SqlJson(&items))
        .bind(total_hours(&items))
        .fetch_one(&state.db)
        .await?;
        return Ok(Json(updated));
    };

    let action = TimesheetAction::parse(raw_action)?;
    let status = next_status(sheet.status, user.role, action)?;

    let updated = match action {
        TimesheetAction::Submit | TimesheetAction::WithdrawSubmission => {
            sqlx::query_as::<_, TimesheetRow>(
                r#"
                UPDATE timesheets SET
                    status = $2,
                    submitted_at = CASE WHEN $2 = 'submitted'::timesheet_status THEN now() ELSE submitted_at END,
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(status)
            .fetch_one(&state.db)
            .await?
        }
        TimesheetAction::Approve | TimesheetAction::Reject => {
            sqlx::query_as::<_, TimesheetRow>(
                r#"
                UPDATE timesheets SET
                    status = $2, reviewed_by = $3, reviewed_at = now(),
                    feedback = COALESCE($4, feedback), updated_at = now()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(status)
            .bind(user.id)
            .bind(&patch.feedback)
            .fetch_one(&state.db)
            .await?
        }
    };

    info!("Timesheet {id}: {} -> {} via {}", sheet.status, updated.status, action.name());

    let data = json!({ "timesheet_id": id, "employment_id": employment.id });
    match updated.status {
        TimesheetStatus::Submitted => {
            notify_company(
                &state.db,
                employment.company_id,
                NewNotification::new(user.id, Role::Company, "timesheet_submitted", "Timesheet submitted")
                    .body(format!("{:.1} hours submitted for review.", updated.total_hours))
                    .data(data),
            )
            .await;
        }
        TimesheetStatus::Approved => {
            notify(
                &state.db,
                NewNotification::new(employment.user_id, Role::Student, "timesheet_approved", "Timesheet approved")
                    .data(data),
            )
            .await;
        }
        TimesheetStatus::Rejected => {
            notify(
                &state.db,
                NewNotification::new(employment.user_id, Role::Student, "timesheet_rejected", "Timesheet rejected")
                    .body(updated.feedback.clone().unwrap_or_default())
                    .data(data),
            )
            .await;
        }
        TimesheetStatus::Draft => {}
    }

    Ok(Json(updated))
}
