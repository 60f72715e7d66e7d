use anyhow::{anyhow, Context};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Hashes on the blocking pool.
pub async fn hash_password(plain: &str) -> Result<String, AppError> {
    let plain = plain.to_string();
    tokio::task::spawn_blocking(move || hash_blocking(&plain))
        .await
        .context("password hashing task failed")?
}

/// Verifies on the blocking pool.
pub async fn verify_password(plain: &str, stored_hash: &str) -> Result<bool, AppError> {
    let (plain, stored_hash) = (plain.to_string(), stored_hash.to_string());
    let matched = tokio::task::spawn_blocking(move || verify_blocking(&plain, &stored_hash))
        .await
        .context("password verification task failed")?;
    Ok(matched)
}

fn hash_blocking(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// A malformed stored hash counts as a mismatch.
fn verify_blocking(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn validate_new_password(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hash = hash_password("hunter22").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).await.unwrap());
        assert!(!verify_password("hunter23", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-hash").await.unwrap());
    }

    #[test]
    fn test_minimum_length() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
    }
}
