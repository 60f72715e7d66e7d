use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::enums::VerificationStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyRow {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub logo_key: Option<String>,
    pub city: Option<String>,
    pub full_address: Option<String>,
    pub verified_status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CompanyRow {
    pub fn is_verified(&self) -> bool {
        self.verified_status == VerificationStatus::Approved
    }
}

/// Company as listed in search results, with listing stats attached.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub company: CompanyRow,
    pub active_listing_count: i64,
    pub top_listing_titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyVerificationRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub submitted_by: Uuid,
    pub registration_number: Option<String>,
    pub document_keys: Vec<String>,
    pub notes: Option<String>,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewer_id: Option<Uuid>,
}
