use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};

use crate::config::RedisConfig;
use crate::models::IdentityScope;
use crate::services::ServiceError;

fn token_key(token: &str) -> String {
    format!("revoked:token:{}", token)
}

fn identity_key(identity_id: &str, scope: IdentityScope) -> String {
    format!("revoked:{}:{}", scope.as_str(), identity_id)
}

/// Denylist of tokens and identities whose tokens must be treated as
/// invalid before natural expiry.
///
/// Reads FAIL OPEN: when the underlying store is unreachable they return
/// `false` instead of erroring, because the signature and expiry checks in
/// the token service remain the primary gate. Writes propagate failures.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn blacklist_token(&self, token: &str, ttl_seconds: i64) -> Result<(), ServiceError>;
    async fn is_token_blacklisted(&self, token: &str) -> bool;
    async fn blacklist_identity(
        &self,
        identity_id: &str,
        scope: IdentityScope,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError>;
    async fn is_identity_blacklisted(&self, identity_id: &str, scope: IdentityScope) -> bool;
    /// Drop a blanket revocation, used on account reactivation.
    async fn clear_identity(
        &self,
        identity_id: &str,
        scope: IdentityScope,
    ) -> Result<(), ServiceError>;
    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct RedisRevocationStore {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, ServiceError> {
        tracing::info!(url = %config.url, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects automatically.
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            ServiceError::Redis(e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }

    async fn set_with_ttl(&self, key: &str, ttl_seconds: i64) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg("revoked")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(ServiceError::Redis)
    }

    async fn exists(&self, key: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.manager.clone();
        redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn blacklist_token(&self, token: &str, ttl_seconds: i64) -> Result<(), ServiceError> {
        self.set_with_ttl(&token_key(token), ttl_seconds).await
    }

    async fn is_token_blacklisted(&self, token: &str) -> bool {
        match self.exists(&token_key(token)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(error = %e, "Revocation store read failed, treating token as not revoked");
                false
            }
        }
    }

    async fn blacklist_identity(
        &self,
        identity_id: &str,
        scope: IdentityScope,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError> {
        self.set_with_ttl(&identity_key(identity_id, scope), ttl_seconds)
            .await
    }

    async fn is_identity_blacklisted(&self, identity_id: &str, scope: IdentityScope) -> bool {
        match self.exists(&identity_key(identity_id, scope)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!(error = %e, "Revocation store read failed, treating identity as not revoked");
                false
            }
        }
    }

    async fn clear_identity(
        &self,
        identity_id: &str,
        scope: IdentityScope,
    ) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(identity_key(identity_id, scope))
            .query_async(&mut conn)
            .await
            .map_err(ServiceError::Redis)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(ServiceError::Redis)
    }
}

/// In-memory store with real TTL semantics, used in tests. `fail_reads`
/// and `fail_writes` simulate an unreachable backend.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, Instant>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, key: String, ttl_seconds: i64) -> Result<(), ServiceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "revocation store unavailable"
            )));
        }
        let deadline = Instant::now() + Duration::from_secs(ttl_seconds.max(0) as u64);
        self.entries
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("mutex poisoned: {}", e)))?
            .insert(key, deadline);
        Ok(())
    }

    fn present(&self, key: &str) -> bool {
        if self.fail_reads.load(Ordering::SeqCst) {
            tracing::error!("Revocation store read failed, treating key as not revoked");
            return false;
        }
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return false,
        };
        match entries.get(key) {
            // Expiry is exclusive-after: present strictly before the deadline.
            Some(deadline) if Instant::now() < *deadline => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn blacklist_token(&self, token: &str, ttl_seconds: i64) -> Result<(), ServiceError> {
        self.set(token_key(token), ttl_seconds)
    }

    async fn is_token_blacklisted(&self, token: &str) -> bool {
        self.present(&token_key(token))
    }

    async fn blacklist_identity(
        &self,
        identity_id: &str,
        scope: IdentityScope,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError> {
        self.set(identity_key(identity_id, scope), ttl_seconds)
    }

    async fn is_identity_blacklisted(&self, identity_id: &str, scope: IdentityScope) -> bool {
        self.present(&identity_key(identity_id, scope))
    }

    async fn clear_identity(
        &self,
        identity_id: &str,
        scope: IdentityScope,
    ) -> Result<(), ServiceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "revocation store unavailable"
            )));
        }
        self.entries
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("mutex poisoned: {}", e)))?
            .remove(&identity_key(identity_id, scope));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blanket_revocation_honors_ttl_boundary() {
        let store = MemoryRevocationStore::new();
        store
            .blacklist_identity("id_1", IdentityScope::User, 1)
            .await
            .unwrap();

        assert!(store.is_identity_blacklisted("id_1", IdentityScope::User).await);

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!store.is_identity_blacklisted("id_1", IdentityScope::User).await);
    }

    #[tokio::test]
    async fn scopes_are_independent_namespaces() {
        let store = MemoryRevocationStore::new();
        store
            .blacklist_identity("shared_id", IdentityScope::User, 60)
            .await
            .unwrap();

        assert!(store.is_identity_blacklisted("shared_id", IdentityScope::User).await);
        assert!(!store.is_identity_blacklisted("shared_id", IdentityScope::Admin).await);
    }

    #[tokio::test]
    async fn reads_fail_open() {
        let store = MemoryRevocationStore::new();
        store.blacklist_token("tok", 60).await.unwrap();
        store.fail_reads.store(true, Ordering::SeqCst);

        assert!(!store.is_token_blacklisted("tok").await);
        assert!(!store.is_identity_blacklisted("id", IdentityScope::User).await);
    }

    #[tokio::test]
    async fn writes_propagate_failures() {
        let store = MemoryRevocationStore::new();
        store.fail_writes.store(true, Ordering::SeqCst);

        assert!(store.blacklist_token("tok", 60).await.is_err());
        assert!(store
            .blacklist_identity("id", IdentityScope::Admin, 60)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn clear_identity_is_idempotent() {
        let store = MemoryRevocationStore::new();
        store
            .blacklist_identity("id_1", IdentityScope::Admin, 60)
            .await
            .unwrap();
        store.clear_identity("id_1", IdentityScope::Admin).await.unwrap();
        store.clear_identity("id_1", IdentityScope::Admin).await.unwrap();

        assert!(!store.is_identity_blacklisted("id_1", IdentityScope::Admin).await);
    }
}
