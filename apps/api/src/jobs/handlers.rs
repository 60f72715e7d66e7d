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

use crate::access::{company_owned_by, require_own_company};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::jobs::workflow::{apply_action, can_edit, transition_notice, validate_ranges, JobAction};
use crate::jobs::SELECT_ITEM;
use crate::models::enums::{JobStatus, Role};
use crate::models::job_listing::{JobListingItem, JobListingRow};
use crate::notifications::{notify_admins, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "j.created_at"),
    ("updated_at", "j.updated_at"),
    ("title", "j.title"),
    ("expires_at", "j.expires_at"),
    ("salary_max", "j.salary_max"),
];

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub company_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub publish_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submit_for_approval: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobPatch {
    pub action: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub publish_at: Option<DateTime<Utc>>,
}

impl JobPatch {
    fn has_edits(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.salary_min.is_some()
            || self.salary_max.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.publish_at.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub q: Option<String>,
    pub location: Option<String>,
    pub company_id: Option<Uuid>,
}

/// POST /api/v1/job-listings
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobListingRow>), AppError> {
    let company_id = match user.role {
        Role::Company => {
            let company = require_own_company(&state.db, &user).await?;
            if !company.is_verified() {
                return Err(AppError::Forbidden(
                    "Company verification required".to_string(),
                ));
            }
            company.id
        }
        Role::Admin => req
            .company_id
            .ok_or_else(|| AppError::Validation("company_id is required".to_string()))?,
        Role::Student => return Err(AppError::forbidden()),
    };

    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    validate_ranges(req.salary_min, req.salary_max, req.start_date, req.end_date)?;

    let status = if req.submit_for_approval {
        JobStatus::Pending
    } else {
        JobStatus::Draft
    };

    let listing = sqlx::query_as::<_, JobListingRow>(
        r#"
        INSERT INTO job_listings
            (company_id, created_by, title, description, location, salary_min, salary_max,
             start_date, end_date, publish_at, status, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                CASE WHEN $11 = 'pending'::job_status THEN now() END)
        RETURNING *
        "#,
    )
    .bind(company_id)
    .bind(user.id)
    .bind(title)
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.salary_min)
    .bind(req.salary_max)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.publish_at)
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    info!("Job listing {} created as {}", listing.id, listing.status);

    if listing.status == JobStatus::Pending {
        notify_admins(
            &state.db,
            NewNotification::new(user.id, Role::Admin, "job_submitted", "New job listing submitted")
                .body(listing.title.clone())
                .data(json!({ "job_listing_id": listing.id })),
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /api/v1/job-listings
pub async fn handle_list(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<JobFilter>,
) -> Result<Json<Page<JobListingItem>>, AppError> {
    let window = page.window(SORTABLE, "j.created_at DESC");

    // None: active listings only. Some(None): everything. Some(Some(id)): one company.
    let scope: Option<Option<Uuid>> = match &user {
        Some(u) if u.is_admin() => Some(filter.company_id),
        Some(u) if u.role == Role::Company => {
            Some(Some(require_own_company(&state.db, u).await?.id))
        }
        _ => None,
    };

    let keyword = filter
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    let location = filter
        .location
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| format!("%{l}%"));

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        match scope {
            None => {
                qb.push(" AND j.status = 'active'");
                if let Some(company_id) = filter.company_id {
                    qb.push(" AND j.company_id = ").push_bind(company_id);
                }
            }
            Some(company) => {
                if let Some(company_id) = company {
                    qb.push(" AND j.company_id = ").push_bind(company_id);
                }
                if let Some(status) = filter.status {
                    qb.push(" AND j.status = ").push_bind(status);
                }
            }
        }
        if let Some(k) = &keyword {
            qb.push(" AND j.title ILIKE ").push_bind(k.clone());
        }
        if let Some(l) = &location {
            qb.push(" AND j.location ILIKE ").push_bind(l.clone());
        }
    };

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM job_listings j");
    push_where(&mut count);
    let mut select = QueryBuilder::new(SELECT_ITEM);
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

async fn load(state: &AppState, id: Uuid) -> Result<JobListingItem, AppError> {
    sqlx::query_as::<_, JobListingItem>(&format!("{SELECT_ITEM} WHERE j.id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Job listing"))
}

/// True when `user` owns the listing's company or is an admin.
async fn manages(state: &AppState, user: &AuthUser, company_id: Uuid) -> Result<bool, AppError> {
    Ok(match user.role {
        Role::Admin => true,
        Role::Company => company_owned_by(&state.db, user.id)
            .await?
            .is_some_and(|c| c.id == company_id),
        Role::Student => false,
    })
}

/// GET /api/v1/job-listings/:id
pub async fn handle_get(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobListingItem>, AppError> {
    let item = load(&state, id).await?;
    if item.listing.status == JobStatus::Active {
        return Ok(Json(item));
    }
    match user {
        Some(user) if manages(&state, &user, item.listing.company_id).await? => Ok(Json(item)),
        _ => Err(AppError::not_found("Job listing")),
    }
}

/// PATCH /api/v1/job-listings/:id
pub async fn handle_patch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<JobPatch>,
) -> Result<Json<JobListingRow>, AppError> {
    let current = load(&state, id).await?.listing;
    if !manages(&state, &user, current.company_id).await? {
        return Err(AppError::forbidden());
    }

    let mut listing = current.clone();
    if patch.has_edits() {
        if !can_edit(listing.status, user.role) {
            return Err(AppError::Validation(
                "Only draft or pending listings can be edited".to_string(),
            ));
        }
        if let Some(title) = patch.title.as_deref().map(str::trim) {
            if title.is_empty() {
                return Err(AppError::Validation("title cannot be empty".to_string()));
            }
            listing.title = title.to_string();
        }
        listing.description = patch.description.clone().or(listing.description);
        listing.location = patch.location.clone().or(listing.location);
        listing.salary_min = patch.salary_min.or(listing.salary_min);
        listing.salary_max = patch.salary_max.or(listing.salary_max);
        listing.start_date = patch.start_date.or(listing.start_date);
        listing.end_date = patch.end_date.or(listing.end_date);
        listing.publish_at = patch.publish_at.or(listing.publish_at);
        validate_ranges(
            listing.salary_min,
            listing.salary_max,
            listing.start_date,
            listing.end_date,
        )?;
    }

    let action = patch.action.as_deref().map(JobAction::parse).transpose()?;
    if let Some(action) = action {
        listing = apply_action(&listing, user.role, action, Utc::now())?;
    }

    let saved = sqlx::query_as::<_, JobListingRow>(
        r#"
        UPDATE job_listings SET
            title = $2, description = $3, location = $4, salary_min = $5, salary_max = $6,
            start_date = $7, end_date = $8, status = $9, submitted_at = $10,
            approved_at = $11, publish_at = $12, expires_at = $13, closed_at = $14,
            renewal = $15, renewal_requested_at = $16, last_expiry_reminder_at = $17,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(&listing.location)
    .bind(listing.salary_min)
    .bind(listing.salary_max)
    .bind(listing.start_date)
    .bind(listing.end_date)
    .bind(listing.status)
    .bind(listing.submitted_at)
    .bind(listing.approved_at)
    .bind(listing.publish_at)
    .bind(listing.expires_at)
    .bind(listing.closed_at)
    .bind(listing.renewal)
    .bind(listing.renewal_requested_at)
    .bind(listing.last_expiry_reminder_at)
    .fetch_one(&state.db)
    .await?;

    let data = json!({ "job_listing_id": saved.id });
    if let Some((title, body)) = transition_notice(current.status, saved.status) {
        notify_company(
            &state.db,
            saved.company_id,
            NewNotification::new(user.id, Role::Company, "job_update", title)
                .body(body)
                .data(data.clone()),
        )
        .await;
    }
    match action {
        Some(JobAction::Submit) => {
            notify_admins(
                &state.db,
                NewNotification::new(user.id, Role::Admin, "job_submitted", "New job listing submitted")
                    .body(saved.title.clone())
                    .data(data),
            )
            .await;
        }
        Some(JobAction::RequestRenewal) => {
            notify_admins(
                &state.db,
                NewNotification::new(user.id, Role::Admin, "renewal_requested", "Listing renewal requested")
                    .body(saved.title.clone())
                    .data(data),
            )
            .await;
        }
        Some(JobAction::Renew) => {
            notify_company(
                &state.db,
                saved.company_id,
                NewNotification::new(user.id, Role::Company, "job_update", "Job renewed")
                    .body("Your job listing has been renewed for another 30 days.")
                    .data(data),
            )
            .await;
        }
        _ => {}
    }

    Ok(Json(saved))
}

/// PUT /api/v1/job-listings/:id
pub async fn handle_replace() -> Result<StatusCode, AppError> {
    Err(AppError::MethodNotAllowed)
}

/// DELETE /api/v1/job-listings/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require_role(&[Role::Admin])?;
    let result = sqlx::query("DELETE FROM job_listings WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Job listing"));
    }
    info!("Job listing {id} deleted by admin {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}
