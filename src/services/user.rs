//! User store: creation and lookup of the identities sessions point at.
//!
//! DESIGN
//! ======
//! Routes and the session layer only see `dyn UserStore`. The in-memory
//! store backs tests and database-less runs; `PgUserStore` is the durable
//! implementation. `NewUser::fake` plays the role of a model factory: it
//! produces a unique, valid user without caller-supplied fixtures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Fields required to create a user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

impl NewUser {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }

    /// Random user with a unique email address.
    #[must_use]
    pub fn fake() -> Self {
        let tag: u64 = rand::rng().random();
        Self { name: format!("User {:04}", tag % 10_000), email: format!("user-{tag:016x}@example.test") }
    }

    fn validate(&self) -> Result<(), UserError> {
        if self.name.trim().is_empty() {
            return Err(UserError::Invalid("name must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(UserError::Invalid(format!("invalid email: {}", self.email)));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("invalid user: {0}")]
    Invalid(String),
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and return it with its assigned id.
    async fn create_user(&self, new_user: NewUser) -> Result<User, UserError>;

    /// Look a user up by id.
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, UserError>;
}

// =============================================================================
// IN-MEMORY
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, UserError> {
        new_user.validate()?;
        let mut users = self.users.write().await;
        let folded = new_user.email.to_lowercase();
        if users.values().any(|u| u.email.to_lowercase() == folded) {
            return Err(UserError::DuplicateEmail(new_user.email));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, UserError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

// =============================================================================
// POSTGRES
// =============================================================================

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, UserError> {
        new_user.validate()?;
        let id = Uuid::new_v4();
        let row = sqlx::query("INSERT INTO users (id, name, email) VALUES ($1, $2, $3) RETURNING created_at")
            .bind(id)
            .bind(&new_user.name)
            .bind(&new_user.email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    UserError::DuplicateEmail(new_user.email.clone())
                }
                other => UserError::Db(other),
            })?;

        Ok(User { id, name: new_user.name, email: new_user.email, created_at: row.get("created_at") })
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, UserError> {
        let row = sqlx::query("SELECT id, name, email, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

/// Map a `users` row (`id, name, email, created_at`) to a `User`.
pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
