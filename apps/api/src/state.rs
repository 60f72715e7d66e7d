use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::auth::refresh_store::RefreshTokenStore;
use crate::config::Config;
use crate::mail::Mailer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub config: Config,
    /// SMTP in production, log-only when email is not configured.
    pub mailer: Arc<dyn Mailer>,
    /// Redis-backed in production.
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}
