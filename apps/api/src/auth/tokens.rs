use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::errors::AppError;
use crate::models::enums::Role;

pub const ISSUER: &str = "job-finder";
pub const AUDIENCE: &str = "job-finder-users";
const REFRESH_TYPE: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshClaims {
    pub sub: String,
    pub user_id: Uuid,
    pub token_id: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity carried into a freshly issued token.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub email: &'a str,
    pub role: Role,
}

pub fn issue_access_token(cfg: &JwtConfig, subject: &TokenSubject<'_>) -> Result<String, AppError> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        sub: subject.user_id.to_string(),
        user_id: subject.user_id,
        email: subject.email.to_string(),
        role: subject.role,
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat,
        exp: iat + cfg.access_ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}

/// Returns the signed refresh token and its id.
pub fn issue_refresh_token(cfg: &JwtConfig, user_id: Uuid) -> Result<(String, String), AppError> {
    let token_id = new_token_id();
    let iat = Utc::now().timestamp();
    let claims = RefreshClaims {
        sub: user_id.to_string(),
        user_id,
        token_id: token_id.clone(),
        token_type: REFRESH_TYPE.to_string(),
        iss: ISSUER.to_string(),
        aud: AUDIENCE.to_string(),
        iat,
        exp: iat + cfg.refresh_ttl_secs,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))?;
    Ok((token, token_id))
}

fn validation() -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    v.set_issuer(&[ISSUER]);
    v.set_audience(&[AUDIENCE]);
    v
}

pub fn decode_access_token(cfg: &JwtConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
}

pub fn decode_refresh_token(cfg: &JwtConfig, token: &str) -> Result<RefreshClaims, AppError> {
    let claims = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
        &validation(),
    )
    .map(|data| data.claims)
    .map_err(|_| invalid_refresh())?;

    if claims.token_type != REFRESH_TYPE {
        return Err(invalid_refresh());
    }
    Ok(claims)
}

pub fn invalid_refresh() -> AppError {
    AppError::Unauthorized("Invalid or expired refresh token".to_string())
}

/// 16 random bytes, hex encoded.
pub fn new_token_id() -> String {
    random_hex(16)
}

pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
pub(crate) fn test_jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "access-secret".to_string(),
        refresh_secret: "refresh-secret".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 3600,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: Uuid) -> TokenSubject<'static> {
        TokenSubject {
            user_id: id,
            email: "ada@example.com",
            role: Role::Company,
        }
    }

    #[test]
    fn test_access_token_roundtrip_claims() {
        let cfg = test_jwt_config();
        let id = Uuid::new_v4();
        let token = issue_access_token(&cfg, &subject(id)).unwrap();
        let claims = decode_access_token(&cfg, &token).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Company);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, AUDIENCE);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_access_token_rejects_wrong_secret() {
        let cfg = test_jwt_config();
        let token = issue_access_token(&cfg, &subject(Uuid::new_v4())).unwrap();
        let mut other = test_jwt_config();
        other.secret = "different".to_string();
        assert!(matches!(
            decode_access_token(&other, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let cfg = test_jwt_config();
        let id = Uuid::new_v4();
        let (refresh, token_id) = issue_refresh_token(&cfg, id).unwrap();
        assert_eq!(token_id.len(), 32);

        let claims = decode_refresh_token(&cfg, &refresh).unwrap();
        assert_eq!(claims.token_id, token_id);
        assert_eq!(claims.token_type, "refresh");

        assert!(decode_access_token(&cfg, &refresh).is_err());
        let access = issue_access_token(&cfg, &subject(id)).unwrap();
        assert!(decode_refresh_token(&cfg, &access).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut cfg = test_jwt_config();
        cfg.access_ttl_secs = -3600;
        let token = issue_access_token(&cfg, &subject(Uuid::new_v4())).unwrap();
        assert!(decode_access_token(&cfg, &token).is_err());
    }
}
