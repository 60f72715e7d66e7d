//! Server-side record of issued refresh tokens, keyed by user and token id.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::AppError;

pub fn refresh_key(user_id: Uuid, token_id: &str) -> String {
    format!("refresh_token:{user_id}:{token_id}")
}

/// Carried in `AppState` as `Arc<dyn RefreshTokenStore>`.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn put(
        &self,
        user_id: Uuid,
        token_id: &str,
        token: &str,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    async fn get(&self, user_id: Uuid, token_id: &str) -> Result<Option<String>, AppError>;

    async fn delete(&self, user_id: Uuid, token_id: &str) -> Result<(), AppError>;
}

pub struct RedisRefreshStore {
    client: redis::Client,
}

impl RedisRefreshStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, AppError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl RefreshTokenStore for RedisRefreshStore {
    async fn put(
        &self,
        user_id: Uuid,
        token_id: &str,
        token: &str,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let mut con = self.connection().await?;
        redis::cmd("SETEX")
            .arg(refresh_key(user_id, token_id))
            .arg(ttl_secs.max(1))
            .arg(token)
            .query_async::<_, ()>(&mut con)
            .await?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid, token_id: &str) -> Result<Option<String>, AppError> {
        let mut con = self.connection().await?;
        let stored = redis::cmd("GET")
            .arg(refresh_key(user_id, token_id))
            .query_async::<_, Option<String>>(&mut con)
            .await?;
        Ok(stored)
    }

    async fn delete(&self, user_id: Uuid, token_id: &str) -> Result<(), AppError> {
        let mut con = self.connection().await?;
        redis::cmd("DEL")
            .arg(refresh_key(user_id, token_id))
            .query_async::<_, i64>(&mut con)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryRefreshStore {
        entries: Mutex<HashMap<String, (String, Instant)>>,
    }

    #[async_trait]
    impl RefreshTokenStore for MemoryRefreshStore {
        async fn put(
            &self,
            user_id: Uuid,
            token_id: &str,
            token: &str,
            ttl_secs: u64,
        ) -> Result<(), AppError> {
            let expires = Instant::now() + Duration::from_secs(ttl_secs);
            self.entries
                .lock()
                .await
                .insert(refresh_key(user_id, token_id), (token.to_string(), expires));
            Ok(())
        }

        async fn get(&self, user_id: Uuid, token_id: &str) -> Result<Option<String>, AppError> {
            let entries = self.entries.lock().await;
            Ok(entries
                .get(&refresh_key(user_id, token_id))
                .filter(|(_, expires)| *expires > Instant::now())
                .map(|(token, _)| token.clone()))
        }

        async fn delete(&self, user_id: Uuid, token_id: &str) -> Result<(), AppError> {
            self.entries
                .lock()
                .await
                .remove(&refresh_key(user_id, token_id));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryRefreshStore;
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            refresh_key(id, "abc"),
            "refresh_token:00000000-0000-0000-0000-000000000000:abc"
        );
    }

    #[tokio::test]
    async fn test_memory_store_put_get_delete() {
        let store = MemoryRefreshStore::default();
        let id = Uuid::new_v4();
        store.put(id, "t1", "token-value", 60).await.unwrap();
        assert_eq!(store.get(id, "t1").await.unwrap().as_deref(), Some("token-value"));
        assert_eq!(store.get(id, "t2").await.unwrap(), None);
        store.delete(id, "t1").await.unwrap();
        assert_eq!(store.get(id, "t1").await.unwrap(), None);
    }
}
