use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::enums::{PrivacySetting, Role};
use crate::models::user::{Profile, User};

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: Role,
    pub profile: &'a Profile,
    pub intern_profile: &'a Value,
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
    Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    Ok(
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(pool)
            .await?,
    )
}

/// Matches either the email or the username, case-insensitively.
pub async fn find_by_identifier(pool: &PgPool, identifier: &str) -> Result<Option<User>, AppError> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE lower(email) = lower($1) OR lower(username) = lower($1) LIMIT 1",
    )
    .bind(identifier)
    .fetch_optional(pool)
    .await?)
}

pub async fn email_or_username_taken(
    pool: &PgPool,
    email: &str,
    username: Option<&str>,
) -> Result<bool, AppError> {
    Ok(sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM users
            WHERE lower(email) = lower($1)
               OR ($2::text IS NOT NULL AND lower(username) = lower($2))
        )
        "#,
    )
    .bind(email)
    .bind(username)
    .fetch_one(pool)
    .await?)
}

pub async fn insert(pool: &PgPool, new: NewUser<'_>) -> Result<User, AppError> {
    Ok(sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (email, username, password_hash, role, first_name, last_name, phone,
             avatar_key, bio, city, country, intern_profile)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(new.email)
    .bind(new.username)
    .bind(new.password_hash)
    .bind(new.role)
    .bind(&new.profile.first_name)
    .bind(&new.profile.last_name)
    .bind(&new.profile.phone)
    .bind(&new.profile.avatar_key)
    .bind(&new.profile.bio)
    .bind(&new.profile.city)
    .bind(&new.profile.country)
    .bind(new.intern_profile)
    .fetch_one(pool)
    .await?)
}

pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<User, AppError> {
    Ok(sqlx::query_as::<_, User>(
        "UPDATE users SET last_login_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(pool)
    .await?)
}

pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $2, password_reset_token_hash = NULL,
            password_reset_expires = NULL, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fields a user may change on their own record. `None` keeps the stored value.
#[derive(Debug, Default, serde::Deserialize)]
pub struct SelfUpdate {
    pub username: Option<String>,
    #[serde(default)]
    pub profile: Profile,
    pub intern_profile: Option<Value>,
    pub privacy_setting: Option<PrivacySetting>,
}

pub async fn update_self(pool: &PgPool, id: Uuid, update: &SelfUpdate) -> Result<User, AppError> {
    let p = &update.profile;
    Ok(sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            username        = COALESCE($2, username),
            first_name      = COALESCE($3, first_name),
            last_name       = COALESCE($4, last_name),
            phone           = COALESCE($5, phone),
            avatar_key      = COALESCE($6, avatar_key),
            bio             = COALESCE($7, bio),
            city            = COALESCE($8, city),
            country         = COALESCE($9, country),
            intern_profile  = COALESCE($10, intern_profile),
            privacy_setting = COALESCE($11, privacy_setting),
            updated_at      = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&update.username)
    .bind(&p.first_name)
    .bind(&p.last_name)
    .bind(&p.phone)
    .bind(&p.avatar_key)
    .bind(&p.bio)
    .bind(&p.city)
    .bind(&p.country)
    .bind(&update.intern_profile)
    .bind(update.privacy_setting)
    .fetch_one(pool)
    .await?)
}
