use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub port: u16,
    pub rust_log: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub workflow: WorkflowConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub secure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.smtp_host.as_deref().is_some_and(|h| !h.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub application_validity_days: i64,
    pub offer_validity_days: i64,
    pub generate_summary: bool,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_secret = require_env("JWT_SECRET")?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            port: parse_env("PORT", 3030)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt: JwtConfig {
                refresh_secret: std::env::var("JWT_REFRESH_SECRET")
                    .unwrap_or_else(|_| jwt_secret.clone()),
                secret: jwt_secret,
                access_ttl_secs: parse_env("JWT_EXPIRES_IN_SECS", 15 * 60)?,
                refresh_ttl_secs: parse_env("JWT_REFRESH_EXPIRES_IN_SECS", 7 * 24 * 60 * 60)?,
            },
            email: EmailConfig {
                smtp_host: std::env::var("EMAIL_HOST").ok(),
                smtp_port: parse_env("EMAIL_PORT", 1025)?,
                secure: parse_bool(std::env::var("EMAIL_SECURE").ok().as_deref(), false),
                username: std::env::var("EMAIL_USER").ok().filter(|s| !s.is_empty()),
                password: std::env::var("EMAIL_PASS").ok().filter(|s| !s.is_empty()),
                from_address: std::env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "noreply@jobfinder.com".to_string()),
            },
            workflow: WorkflowConfig {
                application_validity_days: parse_env("APPLICATION_VALIDITY_DAYS", 14)?,
                offer_validity_days: parse_env("OFFER_VALIDITY_DAYS", 7)?,
                generate_summary: parse_bool(
                    std::env::var("GENERATE_SUMMARY").ok().as_deref(),
                    true,
                ),
            },
            scheduler: SchedulerConfig {
                enabled: parse_bool(std::env::var("SCHEDULER_ENABLED").ok().as_deref(), true),
                interval_minutes: parse_env::<u64>("SCHEDULER_INTERVAL_MINUTES", 60)?.max(1),
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

/// Anything other than an explicit "false"/"0"/"no" keeps the flag on.
fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_explicit_values() {
        assert!(!parse_bool(Some("false"), true));
        assert!(!parse_bool(Some("0"), true));
        assert!(parse_bool(Some("TRUE"), false));
    }

    #[test]
    fn test_parse_bool_falls_back_to_default() {
        assert!(parse_bool(None, true));
        assert!(!parse_bool(Some("maybe"), false));
    }

    #[test]
    fn test_email_config_requires_host() {
        let mut cfg = EmailConfig::default();
        assert!(!cfg.is_configured());
        cfg.smtp_host = Some(String::new());
        assert!(!cfg.is_configured());
        cfg.smtp_host = Some("localhost".to_string());
        assert!(cfg.is_configured());
    }
}
