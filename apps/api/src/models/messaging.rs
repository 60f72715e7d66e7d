use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A conversation between one company and one student.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ThreadRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_user_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
