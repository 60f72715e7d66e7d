use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::QueryBuilder;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::engagement::JobMark;
use crate::errors::AppError;
use crate::models::engagement::{JobMarkRow, LikedCompanyRow};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;

const SORTABLE: &[(&str, &str)] = &[("created_at", "created_at")];

#[derive(Debug, Deserialize)]
pub struct JobMarkRequest {
    pub job_listing_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LikeCompanyRequest {
    pub company_id: Uuid,
}

async fn add_job_mark(state: &AppState, user: &AuthUser, mark: JobMark, job_id: Uuid) -> Result<JobMarkRow, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM job_listings WHERE id = $1)")
        .bind(job_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(AppError::not_found("Job"));
    }
    let sql = mark.upsert_sql();
    Ok(sqlx::query_as::<_, JobMarkRow>(&sql)
        .bind(user.id)
        .bind(job_id)
        .fetch_one(&state.db)
        .await?)
}

async fn list_job_marks(
    state: &AppState,
    user: &AuthUser,
    mark: JobMark,
    page: &PageParams,
) -> Result<Page<JobMarkRow>, AppError> {
    let window = page.window(SORTABLE, "created_at DESC");
    let mut count = QueryBuilder::new(format!("SELECT COUNT(*) FROM {} WHERE user_id = ", mark.table()));
    count.push_bind(user.id);
    let mut select = QueryBuilder::new(format!("SELECT * FROM {} WHERE user_id = ", mark.table()));
    select.push_bind(user.id);
    Ok(fetch_page(&state.db, count, select, &window).await?)
}

async fn remove_job_mark(state: &AppState, user: &AuthUser, mark: JobMark, job_id: Uuid) -> Result<(), AppError> {
    let sql = format!(
        "DELETE FROM {} WHERE user_id = $1 AND job_listing_id = $2",
        mark.table()
    );
    sqlx::query(&sql)
    .bind(user.id)
    .bind(job_id)
    .execute(&state.db)
    .await?;
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Saved jobs
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/saved-jobs
pub async fn handle_save_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<JobMarkRequest>,
) -> Result<(StatusCode, Json<JobMarkRow>), AppError> {
    let row = add_job_mark(&state, &user, JobMark::Saved, req.job_listing_id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/saved-jobs
pub async fn handle_list_saved_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<JobMarkRow>>, AppError> {
    Ok(Json(list_job_marks(&state, &user, JobMark::Saved, &page).await?))
}

/// DELETE /api/v1/saved-jobs/:job_listing_id
pub async fn handle_unsave_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    remove_job_mark(&state, &user, JobMark::Saved, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Liked jobs
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/liked-jobs
pub async fn handle_like_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<JobMarkRequest>,
) -> Result<(StatusCode, Json<JobMarkRow>), AppError> {
    let row = add_job_mark(&state, &user, JobMark::Liked, req.job_listing_id).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/liked-jobs
pub async fn handle_list_liked_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<JobMarkRow>>, AppError> {
    Ok(Json(list_job_marks(&state, &user, JobMark::Liked, &page).await?))
}

/// DELETE /api/v1/liked-jobs/:job_listing_id
pub async fn handle_unlike_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    remove_job_mark(&state, &user, JobMark::Liked, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Liked companies
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/liked-companies
pub async fn handle_like_company(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LikeCompanyRequest>,
) -> Result<(StatusCode, Json<LikedCompanyRow>), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM companies WHERE id = $1)")
        .bind(req.company_id)
        .fetch_one(&state.db)
        .await?;
    if !exists {
        return Err(AppError::not_found("Company"));
    }
    let row = sqlx::query_as::<_, LikedCompanyRow>(
        r#"
        INSERT INTO liked_companies (user_id, company_id) VALUES ($1, $2)
        ON CONFLICT (user_id, company_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(req.company_id)
    .fetch_one(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/liked-companies
pub async fn handle_list_liked_companies(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<LikedCompanyRow>>, AppError> {
    let window = page.window(SORTABLE, "created_at DESC");
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM liked_companies WHERE user_id = ");
    count.push_bind(user.id);
    let mut select = QueryBuilder::new("SELECT * FROM liked_companies WHERE user_id = ");
    select.push_bind(user.id);
    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// DELETE /api/v1/liked-companies/:company_id
pub async fn handle_unlike_company(
    State(state): State<AppState>,
    user: AuthUser,
    Path(company_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    sqlx::query("DELETE FROM liked_companies WHERE user_id = $1 AND company_id = $2")
        .bind(user.id)
        .bind(company_id)
        .execute(&state.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
