//! Company verification (KYC) submissions and admin decisions.

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

use crate::access::require_own_company;
use crate::auth::AuthUser;
use crate::companies::decide_verification;
use crate::errors::AppError;
use crate::mail::{send_best_effort, templates};
use crate::models::company::{CompanyRow, CompanyVerificationRow};
use crate::models::enums::{Role, VerificationStatus};
use crate::notifications::{notify, notify_admins, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::users::repo;

#[derive(Debug, Deserialize)]
pub struct SubmitVerificationRequest {
    pub registration_number: Option<String>,
    #[serde(default)]
    pub document_keys: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationFilter {
    pub status: Option<VerificationStatus>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub action: String,
    pub rejection_reason: Option<String>,
}

/// POST /api/v1/company-verifications
pub async fn handle_submit(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SubmitVerificationRequest>,
) -> Result<(StatusCode, Json<CompanyVerificationRow>), AppError> {
    user.require_role(&[Role::Company])?;
    let company = require_own_company(&state.db, &user).await?;

    let submission = sqlx::query_as::<_, CompanyVerificationRow>(
        r#"
        INSERT INTO company_verifications
            (company_id, submitted_by, registration_number, document_keys, notes)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(company.id)
    .bind(user.id)
    .bind(&req.registration_number)
    .bind(&req.document_keys)
    .bind(&req.notes)
    .fetch_one(&state.db)
    .await?;

    sqlx::query(
        r#"
        UPDATE companies
        SET verified_status = 'pending', submitted_at = now(), rejection_reason = NULL,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(company.id)
    .execute(&state.db)
    .await?;

    info!("Verification {} submitted for company {}", submission.id, company.id);

    let data = json!({ "verification_id": submission.id, "company_id": company.id });
    notify(
        &state.db,
        NewNotification::new(user.id, Role::Company, "kyc_submitted", "Verification submitted")
            .body(format!("We received the verification documents for {}.", company.name))
            .data(data.clone()),
    )
    .await;
    notify_admins(
        &state.db,
        NewNotification::new(user.id, Role::Admin, "kyc_review_required", "Company verification pending")
            .body(format!("{} submitted verification documents.", company.name))
            .data(data),
    )
    .await;

    Ok((StatusCode::CREATED, Json(submission)))
}

/// GET /api/v1/company-verifications
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<VerificationFilter>,
) -> Result<Json<Page<CompanyVerificationRow>>, AppError> {
    user.require_role(&[Role::Admin, Role::Company])?;
    let window = page.window(&[("submitted_at", "submitted_at")], "submitted_at DESC");

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        if !user.is_admin() {
            qb.push(" AND submitted_by = ").push_bind(user.id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
    };
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM company_verifications");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM company_verifications");
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

async fn load(state: &AppState, id: Uuid) -> Result<CompanyVerificationRow, AppError> {
    sqlx::query_as::<_, CompanyVerificationRow>("SELECT * FROM company_verifications WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Verification"))
}

/// GET /api/v1/company-verifications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CompanyVerificationRow>, AppError> {
    let submission = load(&state, id).await?;
    if !user.is_admin() && submission.submitted_by != user.id {
        return Err(AppError::forbidden());
    }
    Ok(Json(submission))
}

/// PATCH /api/v1/company-verifications/:id
pub async fn handle_decide(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<CompanyVerificationRow>, AppError> {
    admin.require_role(&[Role::Admin])?;
    let submission = load(&state, id).await?;
    let next = decide_verification(submission.status, req.action.trim())?;
    let reason = match next {
        VerificationStatus::Rejected => req.rejection_reason.clone(),
        _ => None,
    };

    let updated = sqlx::query_as::<_, CompanyVerificationRow>(
        r#"
        UPDATE company_verifications
        SET status = $2, rejection_reason = $3, reviewer_id = $4, reviewed_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(next)
    .bind(&reason)
    .bind(admin.id)
    .fetch_one(&state.db)
    .await?;

    let company = sqlx::query_as::<_, CompanyRow>(
        r#"
        UPDATE companies
        SET verified_status = $2, rejection_reason = $3, reviewer_id = $4,
            reviewed_at = now(), updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(submission.company_id)
    .bind(next)
    .bind(&reason)
    .bind(admin.id)
    .fetch_one(&state.db)
    .await?;

    info!("Verification {id} {} by admin {}", next, admin.id);

    let (kind, title) = match next {
        VerificationStatus::Approved => ("kyc_approved", "Company verified"),
        _ => ("kyc_rejected", "Company verification rejected"),
    };
    notify(
        &state.db,
        NewNotification::new(company.owner_user_id, Role::Company, kind, title)
            .body(reason.clone().unwrap_or_default())
            .data(json!({ "verification_id": id, "company_id": company.id })),
    )
    .await;

    if next == VerificationStatus::Rejected {
        if let Some(owner) = repo::find_by_id(&state.db, company.owner_user_id).await? {
            let mail = templates::company_rejected_email(&owner.email, &company.name, reason.as_deref());
            send_best_effort(state.mailer.as_ref(), mail).await;
        }
    }

    Ok(Json(updated))
}
