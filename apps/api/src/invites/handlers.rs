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

use crate::access::{company_owned_by, require_own_company, resolve_scope, Scope};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::invites::{respond, Party};
use crate::models::enums::{InviteStatus, Role};
use crate::models::invite::InviteRow;
use crate::notifications::{notify, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::users::repo;

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("updated_at", "updated_at"),
];

#[derive(Debug, Deserialize)]
pub struct CreateInviteRequest {
    pub user_id: Uuid,
    pub job_listing_id: Option<Uuid>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteFilter {
    pub status: Option<InviteStatus>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: InviteStatus,
}

/// POST /api/v1/invites
pub async fn handle_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<InviteRow>), AppError> {
    user.require_role(&[Role::Company])?;
    let company = require_own_company(&state.db, &user).await?;
    if !company.is_verified() {
        return Err(AppError::Forbidden(
            "Company verification required".to_string(),
        ));
    }

    let target = repo::find_by_id(&state.db, req.user_id)
        .await?
        .filter(|u| u.role == Role::Student)
        .ok_or_else(|| AppError::Validation("Invite target must be a student".to_string()))?;

    if let Some(job_id) = req.job_listing_id {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM job_listings WHERE id = $1 AND company_id = $2)",
        )
        .bind(job_id)
        .bind(company.id)
        .fetch_one(&state.db)
        .await?;
        if !owned {
            return Err(AppError::not_found("Job"));
        }
    }

    let invite = sqlx::query_as::<_, InviteRow>(
        r#"
        INSERT INTO invites (company_id, user_id, job_listing_id, message, status)
        VALUES ($1, $2, $3, $4, 'pending')
        RETURNING *
        "#,
    )
    .bind(company.id)
    .bind(target.id)
    .bind(req.job_listing_id)
    .bind(&req.message)
    .fetch_one(&state.db)
    .await?;

    info!("Company {} invited student {}", company.id, target.id);
    notify(
        &state.db,
        NewNotification::new(target.id, Role::Student, "invite_created", "You have a new invite")
            .body(format!("{} invited you to apply.", company.name))
            .data(json!({ "invite_id": invite.id, "company_id": company.id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(invite)))
}

/// GET /api/v1/invites
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<InviteFilter>,
) -> Result<Json<Page<InviteRow>>, AppError> {
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
    };
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM invites");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM invites");
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// PATCH /api/v1/invites/:id
pub async fn handle_respond(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<InviteRow>, AppError> {
    let invite = sqlx::query_as::<_, InviteRow>("SELECT * FROM invites WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::not_found("Invite"))?;

    let party = if user.role == Role::Student && invite.user_id == user.id {
        Party::Invitee
    } else if user.role == Role::Company
        && company_owned_by(&state.db, user.id)
            .await?
            .is_some_and(|c| c.id == invite.company_id)
    {
        Party::InvitingCompany
    } else {
        Party::Other
    };
    let status = respond(invite.status, party, req.status)?;

    let updated = sqlx::query_as::<_, InviteRow>(
        r#"
        UPDATE invites SET status = $2, responded_at = now(), updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    info!("Invite {id} -> {status}");
    let data = json!({ "invite_id": id, "status": status });
    match party {
        Party::Invitee => {
            notify_company(
                &state.db,
                invite.company_id,
                NewNotification::new(user.id, Role::Company, "invite_responded", format!("Invite {status}"))
                    .data(data),
            )
            .await
        }
        _ => {
            notify(
                &state.db,
                NewNotification::new(invite.user_id, Role::Student, "invite_cancelled", "Invite cancelled")
                    .data(data),
            )
            .await
        }
    }

    Ok(Json(updated))
}
