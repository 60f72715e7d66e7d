use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::enums::ApplicationStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterviewDetails {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub mode: Option<String>,
    pub notes: Option<String>,
    pub outcome: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OfferDetails {
    pub sent_at: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub job_listing_id: Uuid,
    pub candidate_statement: Option<String>,
    pub form: Value,
    pub attachments: Vec<String>,
    pub summary_key: Option<String>,
    pub status: ApplicationStatus,
    pub validity_until: DateTime<Utc>,
    pub interview: Option<Json<InterviewDetails>>,
    pub offer: Option<Json<OfferDetails>>,
    pub submitted_at: DateTime<Utc>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of an application's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationEventRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub actor_role: String,
    pub action: String,
    pub data: Value,
    pub at: DateTime<Utc>,
}
