//! Revocation list for refresh tokens
//!
//! Tokens are tracked by their `jti` claim. An entry only needs to live as
//! long as the token it blocks, so every entry carries a TTL equal to the
//! token's remaining lifetime.

use anyhow::Result;
use async_trait::async_trait;
use common::cache::RedisPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Revocation list backing the token service
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Record `jti` as revoked for `ttl_seconds`.
    ///
    /// Returns `true` only for the call that inserted the entry. Check and
    /// insert must be one atomic step.
    async fn revoke(&self, jti: &Uuid, ttl_seconds: u64) -> Result<bool>;

    /// Whether `jti` is currently revoked
    async fn is_revoked(&self, jti: &Uuid) -> Result<bool>;
}

/// Redis-backed revocation list, shared by every service instance
#[derive(Clone)]
pub struct RedisBlacklist {
    redis_pool: RedisPool,
}

impl RedisBlacklist {
    pub fn new(redis_pool: RedisPool) -> Self {
        Self { redis_pool }
    }

    fn key(jti: &Uuid) -> String {
        format!("blacklisted_token:{}", jti)
    }
}

#[async_trait]
impl TokenBlacklist for RedisBlacklist {
    async fn revoke(&self, jti: &Uuid, ttl_seconds: u64) -> Result<bool> {
        self.redis_pool
            .set_if_absent(&Self::key(jti), "1", ttl_seconds)
            .await
    }

    async fn is_revoked(&self, jti: &Uuid) -> Result<bool> {
        self.redis_pool.exists(&Self::key(jti)).await
    }
}

/// Process-local revocation list for single-instance deployments and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryBlacklist {
    entries: Arc<Mutex<HashMap<Uuid, Instant>>>,
}

impl MemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenBlacklist for MemoryBlacklist {
    async fn revoke(&self, jti: &Uuid, ttl_seconds: u64) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        entries.retain(|_, expires| *expires > now);

        if entries.contains_key(jti) {
            return Ok(false);
        }

        entries.insert(*jti, now + Duration::from_secs(ttl_seconds.max(1)));
        Ok(true)
    }

    async fn is_revoked(&self, jti: &Uuid) -> Result<bool> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(jti)
            .is_some_and(|expires| *expires > Instant::now()))
    }
}
