use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::access::{resolve_scope, Scope};
use crate::auth::AuthUser;
use crate::dashboards::{
    total, zero_filled, Counts, MonitoringList, PendingDecisions, APPLICATIONS, EMPLOYMENTS,
    EXPIRING_WINDOW_DAYS, PENDING_REQUESTS, RECENT_LISTINGS, TIMESHEETS,
};
use crate::errors::AppError;
use crate::jobs::SELECT_ITEM;
use crate::models::company::CompanyRow;
use crate::models::enums::{
    ApplicationStatus, EmploymentStatus, JobStatus, RequestKind, Role, StatusLabel,
    TimesheetStatus, VerificationStatus,
};
use crate::models::job_listing::JobListingItem;
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusCounts {
    pub applications: Counts,
    pub employments: Counts,
    pub timesheets: Counts,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub counts: StatusCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_review: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_decisions: Option<PendingDecisions>,
}

#[derive(Debug, Serialize)]
pub struct Tally {
    pub by_status: Counts,
    pub total: i64,
}

impl Tally {
    fn new(by_status: Counts) -> Self {
        let total = total(&by_status);
        Tally { by_status, total }
    }
}

#[derive(Debug, Serialize)]
pub struct MonitoringOverview {
    pub listings: Tally,
    pub companies: Tally,
    pub users_by_role: Counts,
    pub recent_listings: Vec<JobListingItem>,
}

#[derive(Debug, Deserialize)]
pub struct MonitoringQuery {
    #[serde(rename = "type")]
    pub list_type: String,
    pub q: Option<String>,
    pub max_days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MonitoringItem {
    Job(JobListingItem),
    Company(CompanyRow),
}

async fn status_counts(state: &AppState, scope: Scope) -> Result<StatusCounts, AppError> {
    Ok(StatusCounts {
        applications: APPLICATIONS.counts::<ApplicationStatus>(&state.db, scope).await?,
        employments: EMPLOYMENTS.counts::<EmploymentStatus>(&state.db, scope).await?,
        timesheets: TIMESHEETS.counts::<TimesheetStatus>(&state.db, scope).await?,
    })
}

async fn pending_decisions(state: &AppState, scope: Scope) -> Result<PendingDecisions, AppError> {
    let by_kind = PENDING_REQUESTS.counts::<RequestKind>(&state.db, scope).await?;
    Ok(PendingDecisions::from_counts(&by_kind))
}

/// GET /api/v1/dashboard/student
pub async fn handle_student(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    user.require_role(&[Role::Student])?;
    Ok(Json(Dashboard {
        counts: status_counts(&state, Scope::Student(user.id)).await?,
        pending_review: None,
        pending_decisions: None,
    }))
}

/// GET /api/v1/dashboard/company
///
/// A company user without a company gets all-zero counts.
pub async fn handle_company(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    user.require_role(&[Role::Company])?;
    let scope = resolve_scope(&state.db, &user).await?;
    let counts = status_counts(&state, scope).await?;
    let pending_review = counts.timesheets.get(TimesheetStatus::Submitted.label()).copied();
    Ok(Json(Dashboard {
        pending_review: Some(pending_review.unwrap_or(0)),
        pending_decisions: Some(pending_decisions(&state, scope).await?),
        counts,
    }))
}

/// GET /api/v1/dashboard/admin
pub async fn handle_admin(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    user.require_role(&[Role::Admin])?;
    let counts = status_counts(&state, Scope::All).await?;
    let pending_review = counts.timesheets.get(TimesheetStatus::Submitted.label()).copied();
    Ok(Json(Dashboard {
        pending_review: Some(pending_review.unwrap_or(0)),
        pending_decisions: Some(pending_decisions(&state, Scope::All).await?),
        counts,
    }))
}

/// GET /api/v1/monitoring/overview
pub async fn handle_monitoring_overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MonitoringOverview>, AppError> {
    user.require_role(&[Role::Admin])?;

    let listings: Vec<(JobStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM job_listings GROUP BY status")
            .fetch_all(&state.db)
            .await?;
    let companies: Vec<(VerificationStatus, i64)> =
        sqlx::query_as("SELECT verified_status, COUNT(*) FROM companies GROUP BY verified_status")
            .fetch_all(&state.db)
            .await?;
    let users: Vec<(Role, i64)> = sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
        .fetch_all(&state.db)
        .await?;
    let recent_listings = sqlx::query_as::<_, JobListingItem>(&format!(
        "{SELECT_ITEM} ORDER BY j.updated_at DESC LIMIT {RECENT_LISTINGS}"
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(MonitoringOverview {
        listings: Tally::new(zero_filled(&listings)),
        companies: Tally::new(zero_filled(&companies)),
        users_by_role: zero_filled(&users),
        recent_listings,
    }))
}

/// GET /api/v1/monitoring/list?type=
///
/// Unknown types yield an empty page.
pub async fn handle_monitoring_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(query): Query<MonitoringQuery>,
) -> Result<Json<Page<MonitoringItem>>, AppError> {
    user.require_role(&[Role::Admin])?;

    let Some(list) = MonitoringList::parse(&query.list_type) else {
        return Ok(Json(Page::empty(&page.window(&[], "created_at DESC"))));
    };

    if list == MonitoringList::PendingCompanies {
        let window = page.window(&[("created_at", "created_at"), ("name", "name")], "submitted_at ASC NULLS LAST");
        let count = QueryBuilder::new("SELECT COUNT(*) FROM companies WHERE verified_status = 'pending'");
        let select = QueryBuilder::new("SELECT * FROM companies WHERE verified_status = 'pending'");
        let companies: Page<CompanyRow> = fetch_page(&state.db, count, select, &window).await?;
        return Ok(Json(companies.map(MonitoringItem::Company)));
    }

    let now = Utc::now();
    let keyword = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        match list {
            MonitoringList::PendingJobs => {
                qb.push(" WHERE j.status = 'pending'");
            }
            MonitoringList::RenewalRequests => {
                qb.push(" WHERE j.status = 'active' AND j.renewal = TRUE");
                if let Some(days) = query.max_days.filter(|d| *d >= 0) {
                    qb.push(" AND j.expires_at <= ").push_bind(now + Duration::days(days));
                }
            }
            MonitoringList::ExpiringJobs | MonitoringList::PendingCompanies => {
                qb.push(" WHERE j.status = 'active' AND j.expires_at > ")
                    .push_bind(now)
                    .push(" AND j.expires_at <= ")
                    .push_bind(now + Duration::days(EXPIRING_WINDOW_DAYS));
            }
        }
        if let Some(keyword) = &keyword {
            qb.push(" AND (j.title ILIKE ")
                .push_bind(keyword.clone())
                .push(" OR c.name ILIKE ")
                .push_bind(keyword.clone())
                .push(")");
        }
    };

    let default_order = match list {
        MonitoringList::PendingJobs => "j.submitted_at ASC NULLS LAST",
        MonitoringList::RenewalRequests => "j.renewal_requested_at ASC NULLS LAST",
        _ => "j.expires_at ASC",
    };
    let window = page.window(
        &[
            ("created_at", "j.created_at"),
            ("expires_at", "j.expires_at"),
            ("renewal_requested_at", "j.renewal_requested_at"),
            ("title", "j.title"),
        ],
        default_order,
    );
    let mut count = QueryBuilder::new(
        "SELECT COUNT(*) FROM job_listings j JOIN companies c ON c.id = j.company_id",
    );
    push_where(&mut count);
    let mut select = QueryBuilder::new(SELECT_ITEM);
    push_where(&mut select);

    let jobs: Page<JobListingItem> = fetch_page(&state.db, count, select, &window).await?;
    Ok(Json(jobs.map(MonitoringItem::Job)))
}
