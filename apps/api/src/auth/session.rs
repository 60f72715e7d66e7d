use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::refresh_store::RefreshTokenStore;
use crate::auth::tokens::{
    decode_refresh_token, invalid_refresh, issue_access_token, issue_refresh_token, RefreshClaims,
    TokenSubject,
};
use crate::config::JwtConfig;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues an access/refresh pair and records the refresh token.
pub async fn start_session(
    store: &dyn RefreshTokenStore,
    cfg: &JwtConfig,
    subject: &TokenSubject<'_>,
) -> Result<TokenPair, AppError> {
    let access_token = issue_access_token(cfg, subject)?;
    let (refresh_token, token_id) = issue_refresh_token(cfg, subject.user_id)?;
    store
        .put(
            subject.user_id,
            &token_id,
            &refresh_token,
            cfg.refresh_ttl_secs.max(1) as u64,
        )
        .await?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Verifies a presented refresh token against its signature and the stored copy.
pub async fn validate_refresh(
    store: &dyn RefreshTokenStore,
    cfg: &JwtConfig,
    presented: &str,
) -> Result<RefreshClaims, AppError> {
    let claims = decode_refresh_token(cfg, presented)?;
    let stored = store
        .get(claims.user_id, &claims.token_id)
        .await
        .map_err(|e| {
            warn!("Refresh token lookup failed: {e}");
            invalid_refresh()
        })?;
    match stored {
        Some(token) if token == presented => Ok(claims),
        _ => Err(invalid_refresh()),
    }
}

/// Issues the replacement pair, then drops the old refresh token.
/// Not atomic: a concurrent refresh with the same token may also succeed.
pub async fn rotate_session(
    store: &dyn RefreshTokenStore,
    cfg: &JwtConfig,
    old: &RefreshClaims,
    subject: &TokenSubject<'_>,
) -> Result<TokenPair, AppError> {
    let pair = start_session(store, cfg, subject).await?;
    if let Err(e) = store.delete(old.user_id, &old.token_id).await {
        warn!("Failed to revoke rotated refresh token {}: {e}", old.token_id);
    }
    Ok(pair)
}

/// Revokes the refresh token if it verifies; anything else is a no-op.
pub async fn end_session(store: &dyn RefreshTokenStore, cfg: &JwtConfig, presented: &str) {
    let Ok(claims) = decode_refresh_token(cfg, presented) else {
        return;
    };
    if let Err(e) = store.delete(claims.user_id, &claims.token_id).await {
        warn!("Failed to revoke refresh token on logout: {e}");
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::auth::refresh_store::memory::MemoryRefreshStore;
    use crate::auth::tokens::{decode_access_token, test_jwt_config};
    use crate::models::enums::Role;

    fn subject(id: Uuid) -> TokenSubject<'static> {
        TokenSubject {
            user_id: id,
            email: "grace@example.com",
            role: Role::Student,
        }
    }

    #[tokio::test]
    async fn test_session_issues_usable_pair() {
        let store = MemoryRefreshStore::default();
        let cfg = test_jwt_config();
        let id = Uuid::new_v4();

        let pair = start_session(&store, &cfg, &subject(id)).await.unwrap();
        assert_eq!(decode_access_token(&cfg, &pair.access_token).unwrap().user_id, id);
        let claims = validate_refresh(&store, &cfg, &pair.refresh_token).await.unwrap();
        assert_eq!(claims.user_id, id);
    }

    #[tokio::test]
    async fn test_rotation_invalidates_old_token() {
        let store = MemoryRefreshStore::default();
        let cfg = test_jwt_config();
        let id = Uuid::new_v4();

        let first = start_session(&store, &cfg, &subject(id)).await.unwrap();
        let claims = validate_refresh(&store, &cfg, &first.refresh_token).await.unwrap();
        let second = rotate_session(&store, &cfg, &claims, &subject(id)).await.unwrap();

        assert!(matches!(
            validate_refresh(&store, &cfg, &first.refresh_token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(validate_refresh(&store, &cfg, &second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let store = MemoryRefreshStore::default();
        let cfg = test_jwt_config();
        let pair = start_session(&store, &cfg, &subject(Uuid::new_v4())).await.unwrap();

        end_session(&store, &cfg, &pair.refresh_token).await;
        end_session(&store, &cfg, &pair.refresh_token).await;
        end_session(&store, &cfg, "garbage").await;
        assert!(validate_refresh(&store, &cfg, &pair.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_token_id_rejected() {
        let store = MemoryRefreshStore::default();
        let cfg = test_jwt_config();
        let (token, _) = issue_refresh_token(&cfg, Uuid::new_v4()).unwrap();
        assert!(validate_refresh(&store, &cfg, &token).await.is_err());
    }
}
