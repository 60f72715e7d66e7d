use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, validate_new_password, verify_password};
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::models::enums::{Role, StatusLabel};
use crate::models::user::{Profile, PublicUser, User};
use crate::pagination::{fetch_page, Page, PageParams};
use crate::state::AppState;
use crate::users::masking::{mask_for_company, view_user, UserView};
use crate::users::repo::{self, NewUser, SelfUpdate};
use crate::users::verification::begin_verification;

const SORTABLE: &[(&str, &str)] = &[
    ("created_at", "created_at"),
    ("email", "email"),
    ("last_login_at", "last_login_at"),
];

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
    pub username: Option<String>,
    #[serde(default)]
    pub profile: Profile,
    pub intern_profile: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub q: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUserUpdate {
    pub is_active: Option<bool>,
    pub role: Option<Role>,
    pub reason: Option<String>,
}

/// Lowercases and does a shape check: one `@`, a dotted domain, no spaces.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::Validation("Invalid email address".to_string()))
    }
}

/// Admin accounts can only be created by an admin.
pub fn registration_role(requested: Option<Role>, caller: Option<&AuthUser>) -> Result<Role, AppError> {
    match requested.unwrap_or(Role::Student) {
        Role::Admin if caller.is_some_and(AuthUser::is_admin) => Ok(Role::Admin),
        Role::Admin => Err(AppError::Forbidden(
            "Only admins can create admin accounts".to_string(),
        )),
        role => Ok(role),
    }
}

/// POST /api/v1/users
pub async fn handle_register(
    State(state): State<AppState>,
    MaybeAuthUser(caller): MaybeAuthUser,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let email = normalize_email(&req.email)?;
    validate_new_password(&req.password)?;
    let role = registration_role(req.role, caller.as_ref())?;
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    if repo::email_or_username_taken(&state.db, &email, username).await? {
        return Err(AppError::Conflict(
            "Email or username already registered".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password).await?;
    let intern_profile = req
        .intern_profile
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));
    let user = repo::insert(
        &state.db,
        NewUser {
            email: &email,
            username,
            password_hash: &password_hash,
            role,
            profile: &req.profile,
            intern_profile: &intern_profile,
        },
    )
    .await?;
    info!("Registered {} user {}", user.role, user.id);

    if let Err(e) = begin_verification(&state, &user).await {
        warn!("Could not start email verification for {}: {e}", user.id);
    }

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/v1/users/me
pub async fn handle_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let me = repo::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(me.into()))
}

/// PATCH /api/v1/users/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<SelfUpdate>,
) -> Result<Json<PublicUser>, AppError> {
    if let Some(profile) = &update.intern_profile {
        if !profile.is_object() {
            return Err(AppError::Validation(
                "intern_profile must be an object".to_string(),
            ));
        }
    }
    let updated = repo::update_self(&state.db, user.id, &update).await?;
    Ok(Json(updated.into()))
}

/// POST /api/v1/users/me/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let me = repo::find_by_id(&state.db, user.id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    if !verify_password(&req.current_password, &me.password_hash).await? {
        return Err(AppError::Validation(
            "Current password is incorrect".to_string(),
        ));
    }
    validate_new_password(&req.new_password)?;
    repo::update_password(&state.db, me.id, &hash_password(&req.new_password).await?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserView>, AppError> {
    let target = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(Json(view_user(&viewer, target)?))
}

/// GET /api/v1/users
///
/// Admins list every account. Companies get a talent search over students
/// that have not opted out.
pub async fn handle_list_users(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(page): Query<PageParams>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Page<UserView>>, AppError> {
    let window = page.window(SORTABLE, "created_at DESC");
    let talent_search = match viewer.role {
        Role::Admin => false,
        Role::Company => true,
        Role::Student => return Err(AppError::forbidden()),
    };

    let search = filter
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    let city = filter.city.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let push_where = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        if talent_search {
            qb.push(" AND role = ")
                .push_bind(Role::Student)
                .push(" AND privacy_setting <> 'private' AND is_active = TRUE");
        } else {
            if let Some(role) = filter.role {
                qb.push(" AND role = ").push_bind(role);
            }
            if let Some(active) = filter.is_active {
                qb.push(" AND is_active = ").push_bind(active);
            }
        }
        if let Some(pattern) = &search {
            qb.push(" AND (email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(")");
        }
        if let Some(city) = city {
            qb.push(" AND city ILIKE ").push_bind(city.to_string());
        }
    };

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_where(&mut count);
    let mut select = QueryBuilder::new("SELECT * FROM users");
    push_where(&mut select);

    let users: Page<User> = fetch_page(&state.db, count, select, &window).await?;
    Ok(Json(users.map(|u| {
        if talent_search {
            mask_for_company(u)
        } else {
            UserView::Full(u.into())
        }
    })))
}

/// PATCH /api/v1/users/:id
pub async fn handle_admin_update_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUserUpdate>,
) -> Result<Json<PublicUser>, AppError> {
    admin.require_role(&[Role::Admin])?;

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            is_active = COALESCE($2, is_active),
            role = COALESCE($3, role),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.is_active)
    .bind(req.role)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("User"))?;

    info!(
        admin = %admin.id,
        user = %id,
        is_active = ?req.is_active,
        role = ?req.role.map(|r| r.label()),
        reason = req.reason.as_deref().unwrap_or("none"),
        "Admin updated user"
    );
    Ok(Json(updated.into()))
}

/// DELETE /api/v1/users/:id
pub async fn handle_delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !caller.is_admin() && caller.id != id {
        return Err(AppError::forbidden());
    }
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("User"));
    }
    info!("User {id} deleted by {}", caller.id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::sample_auth;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["", "ada", "ada@", "@example.com", "ada@example", "a b@c.com", "a@b@c.com"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_registration_role_rules() {
        assert_eq!(registration_role(None, None).unwrap(), Role::Student);
        assert_eq!(
            registration_role(Some(Role::Company), None).unwrap(),
            Role::Company
        );
        assert!(matches!(
            registration_role(Some(Role::Admin), None),
            Err(AppError::Forbidden(_))
        ));
        let student = sample_auth(Role::Student);
        assert!(registration_role(Some(Role::Admin), Some(&student)).is_err());
        let admin = sample_auth(Role::Admin);
        assert_eq!(
            registration_role(Some(Role::Admin), Some(&admin)).unwrap(),
            Role::Admin
        );
    }
}
