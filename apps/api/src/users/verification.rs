//! Email verification (link token plus 6-digit code) and password reset.

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::auth::password::{hash_password, validate_new_password};
use crate::auth::tokens::random_hex;
use crate::auth::MaybeAuthUser;
use crate::errors::AppError;
use crate::mail::{send_best_effort, templates};
use crate::models::user::User;
use crate::notifications::{notify, NewNotification};
use crate::state::AppState;
use crate::users::repo;

pub const VERIFICATION_TTL_MINUTES: i64 = 10;
pub const RESET_TTL_MINUTES: i64 = 60;
const RESET_ACCEPTED: &str = "If that email is registered, a reset link has been sent";

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSecrets {
    pub token: String,
    pub code: String,
    pub expires: DateTime<Utc>,
}

pub fn new_verification_secrets(now: DateTime<Utc>) -> VerificationSecrets {
    VerificationSecrets {
        token: random_hex(24),
        code: format!("{:06}", rand::thread_rng().gen_range(0..1_000_000)),
        expires: now + Duration::minutes(VERIFICATION_TTL_MINUTES),
    }
}

pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Checks a presented token or code against the user's pending verification.
pub fn check_verification(
    user: &User,
    token: Option<&str>,
    code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let invalid = || AppError::Validation("Invalid token/code".to_string());
    let matches = match (token, code) {
        (Some(t), _) => user.email_verification_token.as_deref() == Some(t),
        (None, Some(c)) => user.email_verification_code.as_deref() == Some(c),
        (None, None) => false,
    };
    if !matches {
        return Err(invalid());
    }
    match user.email_verification_expires {
        Some(expires) if expires > now => Ok(()),
        _ => Err(AppError::Validation("Code expired".to_string())),
    }
}

/// Stores fresh secrets, marks the user unverified and sends the email.
pub async fn begin_verification(state: &AppState, user: &User) -> Result<(), AppError> {
    let secrets = new_verification_secrets(Utc::now());
    sqlx::query(
        r#"
        UPDATE users SET
            email_verification_token = $2,
            email_verification_code = $3,
            email_verification_expires = $4,
            is_email_verified = FALSE,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&secrets.token)
    .bind(&secrets.code)
    .bind(secrets.expires)
    .execute(&state.db)
    .await?;

    let mail = templates::verification_email(
        &state.config.frontend_url,
        &user.email,
        &secrets.token,
        &secrets.code,
        VERIFICATION_TTL_MINUTES,
    );
    send_best_effort(state.mailer.as_ref(), mail).await;

    notify(
        &state.db,
        NewNotification::new(user.id, user.role, "email_verification", "Verify your email")
            .body("We sent a verification link and code to your email address."),
    )
    .await;

    info!("Email verification started for user {}", user.id);
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationConfirm {
    pub token: Option<String>,
    pub code: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

/// POST /api/v1/email-verification
pub async fn handle_request_verification(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(req): Json<VerificationRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = match (req.email.as_deref(), caller) {
        (Some(email), _) => repo::find_by_email(&state.db, email.trim()).await?,
        (None, Some(caller)) => repo::find_by_id(&state.db, caller.id).await?,
        (None, None) => {
            return Err(AppError::Validation("email is required".to_string()));
        }
    }
    .ok_or_else(|| AppError::not_found("User"))?;

    begin_verification(&state, &user).await?;
    Ok(Json(MessageResponse {
        message: "Verification email sent".to_string(),
    }))
}

/// POST /api/v1/email-verification/confirm
pub async fn handle_confirm_verification(
    State(state): State<AppState>,
    Json(req): Json<VerificationConfirm>,
) -> Result<Json<MessageResponse>, AppError> {
    let token = req.token.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let code = req.code.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if token.is_none() && code.is_none() {
        return Err(AppError::Validation("token or code is required".to_string()));
    }

    let user = match (token, req.email.as_deref()) {
        (Some(t), _) => {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email_verification_token = $1")
                .bind(t)
                .fetch_optional(&state.db)
                .await?
        }
        (None, Some(email)) => repo::find_by_email(&state.db, email.trim()).await?,
        (None, None) => {
            sqlx::query_as::<_, User>(
                r#"
                SELECT * FROM users WHERE email_verification_code = $1
                ORDER BY email_verification_expires DESC NULLS LAST
                LIMIT 1
                "#,
            )
            .bind(code)
            .fetch_optional(&state.db)
            .await?
        }
    }
    .ok_or_else(|| AppError::Validation("Invalid token/code".to_string()))?;

    check_verification(&user, token, code, Utc::now())?;

    sqlx::query(
        r#"
        UPDATE users SET
            is_email_verified = TRUE,
            email_verification_token = NULL,
            email_verification_code = NULL,
            email_verification_expires = NULL,
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .execute(&state.db)
    .await?;

    notify(
        &state.db,
        NewNotification::new(user.id, user.role, "email_verified", "Email verified")
            .data(json!({ "email": user.email })),
    )
    .await;

    Ok(Json(MessageResponse {
        message: "Email verified".to_string(),
    }))
}

/// POST /api/v1/password-reset
pub async fn handle_request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let accepted = || {
        Json(MessageResponse {
            message: RESET_ACCEPTED.to_string(),
        })
    };

    let Some(user) = repo::find_by_email(&state.db, req.email.trim()).await? else {
        return Ok(accepted());
    };

    let token = random_hex(32);
    sqlx::query(
        r#"
        UPDATE users SET password_reset_token_hash = $2, password_reset_expires = $3
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(hash_reset_token(&token))
    .bind(Utc::now() + Duration::minutes(RESET_TTL_MINUTES))
    .execute(&state.db)
    .await?;

    let mail = templates::password_reset_email(&state.config.frontend_url, &user.email, &token);
    send_best_effort(state.mailer.as_ref(), mail).await;

    Ok(accepted())
}

/// POST /api/v1/password-reset/confirm
pub async fn handle_reset_password(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_new_password(&req.new_password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE password_reset_token_hash = $1 AND password_reset_expires > now()
        "#,
    )
    .bind(hash_reset_token(req.token.trim()))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::Validation("Invalid or expired reset token".to_string()))?;

    repo::update_password(&state.db, user.id, &hash_password(&req.new_password).await?).await?;
    info!("Password reset for user {}", user.id);

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::Role;
    use crate::models::user::sample_user;

    #[test]
    fn test_secret_shapes() {
        let now = Utc::now();
        let s = new_verification_secrets(now);
        assert_eq!(s.token.len(), 48);
        assert!(s.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(s.code.len(), 6);
        assert!(s.code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(s.expires - now, Duration::minutes(10));
    }

    #[test]
    fn test_reset_token_hash_is_stable_sha256() {
        let h = hash_reset_token("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_check_verification_outcomes() {
        let now = Utc::now();
        let mut user = sample_user(Role::Student);
        user.email_verification_expires = Some(now + Duration::minutes(5));

        assert!(check_verification(&user, Some("tok"), None, now).is_ok());
        assert!(check_verification(&user, None, Some("123456"), now).is_ok());

        let err = check_verification(&user, Some("nope"), None, now).unwrap_err();
        assert!(err.to_string().contains("Invalid token/code"));
        assert!(check_verification(&user, None, None, now).is_err());

        user.email_verification_expires = Some(now - Duration::minutes(1));
        let err = check_verification(&user, None, Some("123456"), now).unwrap_err();
        assert!(err.to_string().contains("Code expired"));
    }
}
