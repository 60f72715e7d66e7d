use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::types::Json as SqlJson;
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::{resolve_scope, Scope};
use crate::applications::summary::generate_summary;
use crate::applications::workflow::{plan_transition, ActionPayload, AppAction, Stamp};
use crate::applications::{load_history, record_event};
use crate::auth::AuthUser;
use crate::employment::create_from_application;
use crate::errors::AppError;
use crate::models::application::{ApplicationEventRow, ApplicationRow};
use crate::models::enums::{ApplicationStatus, JobStatus, Role, StatusLabel};
use crate::models::job_listing::JobListingRow;
use crate::notifications::{notify, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::storage::{presigned_get, SIGNED_URL_TTL_SECS};

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("submitted_at", "submitted_at"),
    ("updated_at", "updated_at"),
    ("validity_until", "validity_until"),
];

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub job_listing_id: Uuid,
    pub candidate_statement: Option<String>,
    pub form: Option<Value>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub validity_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub job_listing_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: String,
    #[serde(flatten)]
    pub payload: ActionPayload,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: ApplicationRow,
    pub history: Vec<ApplicationEventRow>,
}

#[derive(Debug, Serialize)]
pub struct SummaryUrl {
    pub key: String,
    pub url: String,
    pub expires_in: u64,
}

async fn load_scoped(state: &AppState, user: &AuthUser, id: Uuid) -> Result<ApplicationRow, AppError> {
    let app = sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Application"))?;
    let scope = resolve_scope(&state.db, user).await?;
    if !scope.allows(app.user_id, app.company_id) {
        return Err(AppError::forbidden());
    }
    Ok(app)
}

/// Best-effort: failures are logged and the application stays without a summary.
async fn refresh_summary(state: &AppState, app: &ApplicationRow) -> Option<String> {
    match generate_summary(&state.db, &state.s3, &state.config.s3_bucket, app).await {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("Summary generation failed for application {}: {e}", app.id);
            None
        }
    }
}

async fn signed_summary_url(state: &AppState, key: &str) -> Option<String> {
    presigned_get(&state.s3, &state.config.s3_bucket, key, SIGNED_URL_TTL_SECS)
        .await
        .map_err(|e| warn!("Could not sign summary {key}: {e}"))
        .ok()
}

/// POST /api/v1/applications
pub async fn handle_apply(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ApplyRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), AppError> {
    if user.role != Role::Student {
        return Err(AppError::Forbidden("Only students can apply".to_string()));
    }

    let job = sqlx::query_as::<_, JobListingRow>("SELECT * FROM job_listings WHERE id = $1")
        .bind(req.job_listing_id)
        .fetch_optional(&state.db)
        .await?
        .filter(|j| j.status == JobStatus::Active)
        .ok_or_else(|| AppError::not_found("Job"))?;

    let duplicate: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM applications
            WHERE user_id = $1 AND job_listing_id = $2 AND status = ANY($3)
        )
        "#,
    )
    .bind(user.id)
    .bind(job.id)
    .bind(ApplicationStatus::OPEN.to_vec())
    .fetch_one(&state.db)
    .await?;
    if duplicate {
        return Err(AppError::Conflict(
            "You already have an open application for this job".to_string(),
        ));
    }

    let now = Utc::now();
    let validity_until = req
        .validity_until
        .unwrap_or(now + Duration::days(state.config.workflow.application_validity_days));
    let form = req
        .form
        .clone()
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));

    let mut app = sqlx::query_as::<_, ApplicationRow>(
        r#"
        INSERT INTO applications
            (user_id, company_id, job_listing_id, candidate_statement, form, attachments,
             status, validity_until, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, 'new', $7, $8)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(job.company_id)
    .bind(job.id)
    .bind(&req.candidate_statement)
    .bind(&form)
    .bind(&req.attachments)
    .bind(validity_until)
    .bind(now)
    .fetch_one(&state.db)
    .await?;

    record_event(&state.db, app.id, Some(user.id), "student", "apply", json!({})).await?;
    info!("Application {} submitted for job {}", app.id, job.id);

    if state.config.workflow.generate_summary {
        app.summary_key = refresh_summary(&state, &app).await;
    }

    let mut data = json!({ "application_id": app.id, "job_listing_id": job.id });
    if let Some(key) = &app.summary_key {
        if let Some(url) = signed_summary_url(&state, key).await {
            data["summary_url"] = json!(url);
        }
    }
    notify_company(
        &state.db,
        job.company_id,
        NewNotification::new(user.id, Role::Company, "application_created", "New application")
            .body(format!("A student applied to {}.", job.title))
            .data(data),
    )
    .await;

    Ok((StatusCode::CREATED, Json(app)))
}

/// GET /api/v1/applications
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<ApplicationFilter>,
) -> Result<Json<Page<ApplicationRow>>, AppError> {
    let window = page.window(SORTABLE, "created_at DESC");
    let scope = resolve_scope(&state.db, &user).await?;
    if scope == Scope::Nothing {
        return Ok(Json(Page::empty(&window)));
    }

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        scope.push_filter(qb, "user_id", "company_id");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(job) = filter.job_listing_id {
            qb.push(" AND job_listing_id = ").push_bind(job);
        }
    };
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM applications");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM applications");
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// GET /api/v1/applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationDetail>, AppError> {
    let application = load_scoped(&state, &user, id).await?;
    let history = load_history(&state.db, id).await?;
    Ok(Json(ApplicationDetail {
        application,
        history,
    }))
}

/// PATCH /api/v1/applications/:id
pub async fn handle_transition(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<ApplicationRow>, AppError> {
    let app = load_scoped(&state, &user, id).await?;
    let action = AppAction::parse(&req.action)?;
    let event_data = json!({
        "scheduled_at": req.payload.scheduled_at,
        "location": req.payload.location,
        "mode": req.payload.mode,
        "notes": req.payload.notes,
        "valid_until": req.payload.valid_until,
        "title": req.payload.title,
    });

    if action == AppAction::RegenerateSummary {
        record_event(&state.db, id, Some(user.id), user.role.label(), action.name(), event_data).await?;
        let key = refresh_summary(&state, &app).await;
        let mut data = json!({ "application_id": id });
        if let Some(key) = &key {
            if let Some(url) = signed_summary_url(&state, key).await {
                data["summary_url"] = json!(url);
            }
        }
        notify_company(
            &state.db,
            app.company_id,
            NewNotification::new(user.id, Role::Company, "application_summary_regenerated", "Application summary regenerated")
                .data(data),
        )
        .await;
        let refreshed = load_scoped(&state, &user, id).await?;
        return Ok(Json(refreshed));
    }

    let now = Utc::now();
    let transition = plan_transition(
        user.role,
        app.status,
        app.interview.as_ref().map(|j| &j.0),
        action,
        &req.payload,
        now,
        state.config.workflow.offer_validity_days,
    )?;

    let stamp = |which: Stamp| (transition.stamp == Some(which)).then_some(now);
    let updated = sqlx::query_as::<_, ApplicationRow>(
        r#"
        UPDATE applications SET
            status = $2,
            interview = COALESCE($3, interview),
            offer = COALESCE($4, offer),
            rejected_at = COALESCE($5, rejected_at),
            withdrawn_at = COALESCE($6, withdrawn_at),
            accepted_at = COALESCE($7, accepted_at),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(transition.status)
    .bind(transition.interview.clone().map(SqlJson))
    .bind(transition.offer.clone().map(SqlJson))
    .bind(stamp(Stamp::Rejected))
    .bind(stamp(Stamp::Withdrawn))
    .bind(stamp(Stamp::Accepted))
    .fetch_one(&state.db)
    .await?;

    record_event(&state.db, id, Some(user.id), user.role.label(), action.name(), event_data).await?;
    info!(
        "Application {id}: {} -> {} via {}",
        app.status,
        updated.status,
        action.name()
    );

    if transition.creates_employment {
        let employment = create_from_application(&state.db, &updated).await?;
        info!("Employment {} created from application {id}", employment.id);
    }

    let notification = NewNotification::new(app.user_id, Role::Student, transition.notice, "Application update")
        .data(json!({ "application_id": id, "status": updated.status }));
    if user.role == Role::Student {
        notify_company(&state.db, app.company_id, notification).await;
    } else {
        notify(&state.db, notification).await;
    }

    Ok(Json(updated))
}

/// GET /api/v1/applications/:id/summary-url
pub async fn handle_summary_url(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SummaryUrl>, AppError> {
    let app = load_scoped(&state, &user, id).await?;
    let key = app
        .summary_key
        .ok_or_else(|| AppError::not_found("Application summary"))?;
    let url = presigned_get(&state.s3, &state.config.s3_bucket, &key, SIGNED_URL_TTL_SECS).await?;
    Ok(Json(SummaryUrl {
        key,
        url,
        expires_in: SIGNED_URL_TTL_SECS,
    }))
}
