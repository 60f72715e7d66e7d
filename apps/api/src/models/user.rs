use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::enums::{PrivacySetting, Role};

/// Full `users` row. Never serialized directly; see [`PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_key: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub intern_profile: Value,
    pub privacy_setting: PrivacySetting,
    pub is_email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_code: Option<String>,
    pub email_verification_expires: Option<DateTime<Utc>>,
    pub password_reset_token_hash: Option<String>,
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_key: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// The user as returned over the API: no password hash, no tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Role,
    pub profile: Profile,
    pub intern_profile: Value,
    pub privacy_setting: PrivacySetting,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: Some(u.email),
            username: u.username,
            role: u.role,
            profile: Profile {
                first_name: u.first_name,
                last_name: u.last_name,
                phone: u.phone,
                avatar_key: u.avatar_key,
                bio: u.bio,
                city: u.city,
                country: u.country,
            },
            intern_profile: u.intern_profile,
            privacy_setting: u.privacy_setting,
            is_email_verified: u.is_email_verified,
            is_active: u.is_active,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

impl User {
    /// Industries listed under `intern_profile.preferences.industries`.
    pub fn preferred_industries(&self) -> Vec<String> {
        self.intern_profile
            .pointer("/preferences/industries")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn sample_user(role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: "ada@example.com".to_string(),
        username: Some("ada".to_string()),
        password_hash: "$argon2id$stub".to_string(),
        role,
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        phone: Some("+60 12 345 6789".to_string()),
        avatar_key: None,
        bio: None,
        city: Some("Kuala Lumpur".to_string()),
        country: Some("MY".to_string()),
        intern_profile: serde_json::json!({
            "university": "UM",
            "gpa": 3.9,
            "resume": "uploads/resume/x.pdf",
            "portfolio": "https://ada.dev",
            "skills": ["rust"],
            "preferences": { "industries": ["IT", "Finance"] }
        }),
        privacy_setting: PrivacySetting::Full,
        is_email_verified: true,
        email_verification_token: Some("tok".to_string()),
        email_verification_code: Some("123456".to_string()),
        email_verification_expires: None,
        password_reset_token_hash: None,
        password_reset_expires: None,
        is_active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_user_hides_secrets() {
        let user = sample_user(Role::Student);
        let json = serde_json::to_value(PublicUser::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("email_verification_token").is_none());
        assert_eq!(json["profile"]["first_name"], "Ada");
    }

    #[test]
    fn test_preferred_industries() {
        let user = sample_user(Role::Student);
        assert_eq!(user.preferred_industries(), vec!["IT", "Finance"]);

        let mut bare = sample_user(Role::Student);
        bare.intern_profile = serde_json::json!({});
        assert!(bare.preferred_industries().is_empty());
    }
}
