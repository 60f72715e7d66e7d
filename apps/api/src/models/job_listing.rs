use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::enums::JobStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct JobListingRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub publish_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub renewal: bool,
    pub renewal_requested_at: Option<DateTime<Utc>>,
    pub last_expiry_reminder_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing joined with the owning company's name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobListingItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub listing: JobListingRow,
    pub company_name: String,
}
