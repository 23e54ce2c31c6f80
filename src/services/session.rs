//! Session management: opaque cookie tokens bound to users.
//!
//! ARCHITECTURE
//! ============
//! A session token is 32 random bytes rendered as hex and handed to the
//! browser in a cookie. Stores only ever keep its SHA-256 digest.
//!
//! Validation is read-only: it resolves a token to its user or `None`.
//! Expired rows are treated as absent and removed later by the sweeper.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::user::{User, UserError, UserStore, user_from_row};

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Digest under which a token is stored.
#[must_use]
pub fn hash_token(token: &str) -> String {
    bytes_to_hex(&Sha256::digest(token.as_bytes()))
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown user: {0}")]
    UnknownUser(Uuid),
    #[error(transparent)]
    User(#[from] UserError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a session for an existing user, returning the cookie token.
    async fn create_session(&self, user_id: Uuid) -> Result<String, SessionError>;

    /// Resolve a token to its user. Unknown and expired tokens yield `None`.
    async fn validate_session(&self, token: &str) -> Result<Option<User>, SessionError>;

    /// Destroy a session. Deleting an unknown token is not an error.
    async fn delete_session(&self, token: &str) -> Result<(), SessionError>;

    /// Drop every expired session, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, SessionError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

#[derive(Debug, Clone)]
struct SessionRecord {
    user_id: Uuid,
    expires_at: OffsetDateTime,
}

/// Process-local session store. User lookups go through the injected user store.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    users: Arc<dyn UserStore>,
    ttl: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, ttl: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), users, ttl }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, user_id: Uuid) -> Result<String, SessionError> {
        if self.users.find_user(user_id).await?.is_none() {
            return Err(SessionError::UnknownUser(user_id));
        }

        let token = generate_token();
        let record = SessionRecord { user_id, expires_at: OffsetDateTime::now_utc() + self.ttl };
        self.sessions.write().await.insert(hash_token(&token), record);
        Ok(token)
    }

    async fn validate_session(&self, token: &str) -> Result<Option<User>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }

        let record = self.sessions.read().await.get(&hash_token(token)).cloned();
        let Some(record) = record else {
            return Ok(None);
        };
        if record.expires_at <= OffsetDateTime::now_utc() {
            return Ok(None);
        }

        Ok(self.users.find_user(record.user_id).await?)
    }

    async fn delete_session(&self, token: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(&hash_token(token));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

// =============================================================================
// POSTGRES
// =============================================================================

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, user_id: Uuid) -> Result<String, SessionError> {
        let token = generate_token();
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(hash_token(&token))
            .bind(user_id)
            .bind(OffsetDateTime::now_utc() + self.ttl)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    SessionError::UnknownUser(user_id)
                }
                other => SessionError::Db(other),
            })?;
        Ok(token)
    }

    async fn validate_session(&self, token: &str) -> Result<Option<User>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(
            r"SELECT u.id, u.name, u.email, u.created_at
              FROM sessions s
              JOIN users u ON u.id = s.user_id
              WHERE s.token_hash = $1 AND s.expires_at > now()",
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete_session(&self, token: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(hash_token(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// SWEEPER
// =============================================================================

/// Spawn a background task that purges expired sessions every `every`.
pub fn spawn_session_sweeper(store: Arc<dyn SessionStore>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired sessions purged"),
                Err(e) => tracing::error!(error = %e, "session purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
