use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Saved or liked job listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobMarkRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_listing_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LikedCompanyRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
}
