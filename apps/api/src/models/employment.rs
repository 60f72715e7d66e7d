use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::enums::{EmploymentStatus, RequestKind, RequestStatus, Role, TimesheetStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmploymentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub job_listing_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub status: EmploymentStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub cadence: String,
    pub required_docs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmploymentDocumentRow {
    pub id: Uuid,
    pub employment_id: Uuid,
    pub doc_type: String,
    pub file_key: String,
    pub verified: bool,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimesheetItem {
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hours: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimesheetRow {
    pub id: Uuid,
    pub employment_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub cadence: String,
    pub items: Json<Vec<TimesheetItem>>,
    pub total_hours: f64,
    pub status: TimesheetStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resignation, termination, early-completion or extension request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmploymentRequestRow {
    pub id: Uuid,
    pub employment_id: Uuid,
    pub kind: RequestKind,
    pub initiated_by: Role,
    pub initiator_id: Uuid,
    pub reason: Option<String>,
    pub proposed_date: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
