use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::access::{resolve_scope, Scope};
use crate::applications::load_history;
use crate::auth::AuthUser;
use crate::employment::load_scoped_employment;
use crate::errors::AppError;
use crate::models::application::{ApplicationEventRow, ApplicationRow};
use crate::models::employment::{EmploymentDocumentRow, EmploymentRequestRow, EmploymentRow};
use crate::models::enums::{EmploymentStatus, Role, StatusLabel};
use crate::models::job_listing::JobListingRow;
use crate::notifications::{notify, notify_company, NewNotification};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::storage::uploads::validate_key;

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("start_date", "start_date"),
    ("end_date", "end_date"),
];

#[derive(Debug, Deserialize)]
pub struct EmploymentFilter {
    pub status: Option<EmploymentStatus>,
}

#[derive(Debug, Serialize)]
pub struct EmploymentDetail {
    pub employment: EmploymentRow,
    pub job_listing: Option<JobListingRow>,
    pub application: Option<ApplicationRow>,
    pub application_history: Vec<ApplicationEventRow>,
    pub documents: Vec<EmploymentDocumentRow>,
    /// Most recent request of each kind, keyed by kind.
    pub latest_requests: BTreeMap<&'static str, EmploymentRequestRow>,
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub doc_type: String,
    pub file_key: String,
}

/// GET /api/v1/employment
pub async fn handle_list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<EmploymentFilter>,
) -> Result<Json<Page<EmploymentRow>>, AppError> {
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
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM employment_records");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM employment_records");
    push_where(&mut select);

    Ok(Json(fetch_page(&state.db, count, select, &window).await?))
}

/// GET /api/v1/employment/:id
pub async fn handle_get(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EmploymentRow>, AppError> {
    Ok(Json(load_scoped_employment(&state.db, &user, id).await?))
}

/// GET /api/v1/employment/:id/detail
pub async fn handle_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EmploymentDetail>, AppError> {
    let employment = load_scoped_employment(&state.db, &user, id).await?;

    let job_listing = match employment.job_listing_id {
        Some(job_id) => {
            sqlx::query_as::<_, JobListingRow>("SELECT * FROM job_listings WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&state.db)
                .await?
        }
        None => None,
    };

    let (application, application_history) = match employment.application_id {
        Some(app_id) => {
            let app = sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
                .bind(app_id)
                .fetch_optional(&state.db)
                .await?;
            let history = match &app {
                Some(_) => load_history(&state.db, app_id).await?,
                None => Vec::new(),
            };
            (app, history)
        }
        None => (None, Vec::new()),
    };

    let documents = sqlx::query_as::<_, EmploymentDocumentRow>(
        "SELECT * FROM employment_documents WHERE employment_id = $1 ORDER BY uploaded_at ASC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let requests = sqlx::query_as::<_, EmploymentRequestRow>(
        r#"
        SELECT DISTINCT ON (kind) * FROM employment_requests
        WHERE employment_id = $1
        ORDER BY kind, created_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    let latest_requests = requests.into_iter().map(|r| (r.kind.label(), r)).collect();

    Ok(Json(EmploymentDetail {
        employment,
        job_listing,
        application,
        application_history,
        documents,
        latest_requests,
    }))
}

/// POST /api/v1/employment/:id/documents
pub async fn handle_add_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AddDocumentRequest>,
) -> Result<(StatusCode, Json<EmploymentDocumentRow>), AppError> {
    let employment = load_scoped_employment(&state.db, &user, id).await?;
    if employment.user_id != user.id {
        return Err(AppError::Forbidden(
            "Only the employed student can upload documents".to_string(),
        ));
    }
    let doc_type = req.doc_type.trim();
    if doc_type.is_empty() {
        return Err(AppError::Validation("doc_type is required".to_string()));
    }
    validate_key(&req.file_key)?;

    let document = sqlx::query_as::<_, EmploymentDocumentRow>(
        r#"
        INSERT INTO employment_documents (employment_id, doc_type, file_key)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(doc_type)
    .bind(&req.file_key)
    .fetch_one(&state.db)
    .await?;

    info!("Document {} ({doc_type}) added to employment {id}", document.id);
    notify_company(
        &state.db,
        employment.company_id,
        NewNotification::new(user.id, Role::Company, "employment_document_uploaded", "Document uploaded")
            .body(format!("A {doc_type} document is waiting for verification."))
            .data(json!({ "employment_id": id, "document_id": document.id })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(document)))
}

/// POST /api/v1/employment/:id/documents/:doc_id/verify
pub async fn handle_verify_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<EmploymentDocumentRow>, AppError> {
    let employment = load_scoped_employment(&state.db, &user, id).await?;
    if user.role == Role::Student {
        return Err(AppError::Forbidden(
            "Only the company or an admin can verify documents".to_string(),
        ));
    }

    let document = sqlx::query_as::<_, EmploymentDocumentRow>(
        r#"
        UPDATE employment_documents
        SET verified = TRUE, verified_by = $3, verified_at = now()
        WHERE id = $1 AND employment_id = $2
        RETURNING *
        "#,
    )
    .bind(doc_id)
    .bind(id)
    .bind(user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("Document"))?;

    info!("Document {doc_id} on employment {id} verified by {}", user.id);
    notify(
        &state.db,
        NewNotification::new(employment.user_id, Role::Student, "employment_document_verified", "Document verified")
            .body(format!("Your {} document was verified.", document.doc_type))
            .data(json!({ "employment_id": id, "document_id": doc_id })),
    )
    .await;

    Ok(Json(document))
}
