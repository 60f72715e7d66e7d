use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::enums::InviteStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InviteRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub job_listing_id: Option<Uuid>,
    pub message: Option<String>,
    pub status: InviteStatus,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
