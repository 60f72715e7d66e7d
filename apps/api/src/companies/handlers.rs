use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::access::company_owned_by;
use crate::auth::AuthUser;
use crate::companies::SELECT_WITH_STATS;
use crate::errors::AppError;
use crate::models::company::{CompanyListItem, CompanyRow};
use crate::models::enums::{Role, VerificationStatus};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::users::repo;

const SORTABLE: &[(&str, &str)] = &[
    ("name", "c.name"),
    ("created_at", "c.created_at"),
    ("updated_at", "c.updated_at"),
];

#[derive(Debug, Deserialize)]
pub struct CompanyFilter {
    #[serde(alias = "keyword")]
    pub q: Option<String>,
    #[serde(alias = "nature")]
    pub industry: Option<String>,
    #[serde(alias = "location")]
    pub city: Option<String>,
    /// `name` or `latest`.
    pub sort: Option<String>,
    #[serde(default)]
    pub recommended: bool,
    pub verified_status: Option<VerificationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub logo_key: Option<String>,
    pub city: Option<String>,
    pub full_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub logo_key: Option<String>,
    pub city: Option<String>,
    pub full_address: Option<String>,
    /// Admin only.
    pub verified_status: Option<VerificationStatus>,
    /// Admin only.
    pub rejection_reason: Option<String>,
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// POST /api/v1/companies
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<CompanyRow>), AppError> {
    user.require_role(&[Role::Company])?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if company_owned_by(&state.db, user.id).await?.is_some() {
        return Err(AppError::Conflict(
            "A company profile already exists for this user".to_string(),
        ));
    }

    let company = sqlx::query_as::<_, CompanyRow>(
        r#"
        INSERT INTO companies
            (owner_user_id, name, industry, description, website, logo_key, city,
             full_address, verified_status, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', now())
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(name)
    .bind(&req.industry)
    .bind(&req.description)
    .bind(&req.website)
    .bind(&req.logo_key)
    .bind(&req.city)
    .bind(&req.full_address)
    .fetch_one(&state.db)
    .await?;

    info!("Company {} created by {}", company.id, user.id);
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /api/v1/companies
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Json<Page<CompanyListItem>>, AppError> {
    let mut window = page.window(SORTABLE, "c.created_at DESC");
    match filter.sort.as_deref() {
        Some("name") => window.order_by = "c.name ASC".to_string(),
        Some("latest") => window.order_by = "c.created_at DESC".to_string(),
        _ => {}
    }

    let industries = if filter.recommended && user.role == Role::Student {
        repo::find_by_id(&state.db, user.id)
            .await?
            .map(|u| u.preferred_industries())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let keyword = non_blank(&filter.q).map(|q| format!("%{q}%"));
    let industry = non_blank(&filter.industry).map(|i| format!("%{i}%"));
    let city = non_blank(&filter.city).map(|c| format!("%{c}%"));

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        if user.is_admin() {
            if let Some(status) = filter.verified_status {
                qb.push(" AND c.verified_status = ").push_bind(status);
            }
        } else {
            qb.push(" AND (c.verified_status = 'approved' OR c.owner_user_id = ")
                .push_bind(user.id)
                .push(")");
        }
        if let Some(k) = &keyword {
            qb.push(" AND c.name ILIKE ").push_bind(k.clone());
        }
        if !industries.is_empty() {
            qb.push(" AND c.industry = ANY(").push_bind(industries.clone()).push(")");
        } else if let Some(i) = &industry {
            qb.push(" AND c.industry ILIKE ").push_bind(i.clone());
        }
        if let Some(c) = &city {
            qb.push(" AND (c.city ILIKE ")
                .push_bind(c.clone())
                .push(" OR c.full_address ILIKE ")
                .push_bind(c.clone())
                .push(")");
        }
    };

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM companies c");
    push_where(&mut count);
    let mut select = QueryBuilder::new(SELECT_WITH_STATS);
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

async fn load_visible(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<CompanyListItem, AppError> {
    let company = sqlx::query_as::<_, CompanyListItem>(&format!("{SELECT_WITH_STATS} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Company"))?;

    let visible = user.is_admin()
        || company.company.owner_user_id == user.id
        || company.company.is_verified();
    if !visible {
        return Err(AppError::not_found("Company"));
    }
    Ok(company)
}

/// GET /api/v1/companies/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyListItem>, AppError> {
    Ok(Json(load_visible(&state, &user, id).await?))
}

/// GET /api/v1/companies/mine
pub async fn handle_get_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CompanyRow>, AppError> {
    let company = company_owned_by(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("Company"))?;
    Ok(Json(company))
}

/// PATCH /api/v1/companies/:id
pub async fn handle_patch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<CompanyPatch>,
) -> Result<Json<CompanyRow>, AppError> {
    let existing = sqlx::query_as::<_, CompanyRow>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Company"))?;

    if !user.is_admin() {
        if existing.owner_user_id != user.id {
            return Err(AppError::forbidden());
        }
        if patch.verified_status.is_some() || patch.rejection_reason.is_some() {
            return Err(AppError::Forbidden(
                "Only admins can change verification status".to_string(),
            ));
        }
    }

    let reviewed = patch.verified_status.is_some();
    let updated = sqlx::query_as::<_, CompanyRow>(
        r#"
        UPDATE companies SET
            name             = COALESCE($2, name),
            industry         = COALESCE($3, industry),
            description      = COALESCE($4, description),
            website          = COALESCE($5, website),
            logo_key         = COALESCE($6, logo_key),
            city             = COALESCE($7, city),
            full_address     = COALESCE($8, full_address),
            verified_status  = COALESCE($9, verified_status),
            rejection_reason = COALESCE($10, rejection_reason),
            reviewed_at      = CASE WHEN $11 THEN now() ELSE reviewed_at END,
            reviewer_id      = CASE WHEN $11 THEN $12 ELSE reviewer_id END,
            updated_at       = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(non_blank(&patch.name))
    .bind(&patch.industry)
    .bind(&patch.description)
    .bind(&patch.website)
    .bind(&patch.logo_key)
    .bind(&patch.city)
    .bind(&patch.full_address)
    .bind(patch.verified_status)
    .bind(&patch.rejection_reason)
    .bind(reviewed)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(updated))
}

/// DELETE /api/v1/companies/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require_role(&[Role::Admin])?;
    let result = sqlx::query("DELETE FROM companies WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Company"));
    }
    info!("Company {id} deleted by admin {}", user.id);
    Ok(StatusCode::NO_CONTENT)
}
