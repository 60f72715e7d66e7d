pub mod handlers;
pub mod summary;
pub mod workflow;

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::application::ApplicationEventRow;

/// Appends one entry to the application's history.
pub async fn record_event(
    pool: &PgPool,
    application_id: Uuid,
    actor_user_id: Option<Uuid>,
    actor_role: &str,
    action: &str,
    data: Value,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO application_events (application_id, actor_user_id, actor_role, action, data)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(application_id)
    .bind(actor_user_id)
    .bind(actor_role)
    .bind(action)
    .bind(data)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_history(
    pool: &PgPool,
    application_id: Uuid,
) -> Result<Vec<ApplicationEventRow>, AppError> {
    Ok(sqlx::query_as::<_, ApplicationEventRow>(
        "SELECT * FROM application_events WHERE application_id = $1 ORDER BY at ASC",
    )
    .bind(application_id)
    .fetch_all(pool)
    .await?)
}
