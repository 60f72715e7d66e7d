use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::password::verify_password;
use crate::auth::session::{end_session, rotate_session, start_session, validate_refresh, TokenPair};
use crate::auth::tokens::{invalid_refresh, TokenSubject};
use crate::errors::AppError;
use crate::models::user::{PublicUser, User};
use crate::state::AppState;
use crate::users::repo;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

fn subject(user: &User) -> TokenSubject<'_> {
    TokenSubject {
        user_id: user.id,
        email: &user.email,
        role: user.role,
    }
}

/// POST /api/v1/authentication
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid login".to_string());

    let user = repo::find_by_identifier(&state.db, req.identifier.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&req.password, &user.password_hash).await? {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }

    let tokens = start_session(state.refresh_tokens.as_ref(), &state.config.jwt, &subject(&user)).await?;
    let user = repo::touch_last_login(&state.db, user.id).await?;
    info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        user: user.into(),
    }))
}

/// POST /api/v1/refresh-token
pub async fn handle_refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let store = state.refresh_tokens.as_ref();
    let claims = validate_refresh(store, &state.config.jwt, &req.refresh_token).await?;

    let user = repo::find_by_id(&state.db, claims.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid_refresh)?;

    let pair = rotate_session(store, &state.config.jwt, &claims, &subject(&user)).await?;
    Ok(Json(pair))
}

/// POST /api/v1/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> StatusCode {
    end_session(state.refresh_tokens.as_ref(), &state.config.jwt, &req.refresh_token).await;
    StatusCode::NO_CONTENT
}
