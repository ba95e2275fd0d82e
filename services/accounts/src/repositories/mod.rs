//! Credential store
//!
//! Services depend on the [`UserRepository`] and [`RoleRepository`] traits and
//! receive concrete stores at construction time. Two stores ship with the
//! service: PostgreSQL for deployments and an in-memory store for development
//! and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{NewRole, NewUser, Role, User, UserFilter};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgRoleRepository, PgUserRepository};

/// Credential store failures
#[derive(Error, Debug)]
pub enum StoreError {
    /// Uniqueness or reference violation on write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Role deletion blocked because users still reference it
    #[error("Role {0} is still referenced by users")]
    RoleInUse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User records
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Emails are not unique; the oldest matching account wins
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Filtered listing, most recently joined first
    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    async fn create(&self, new_user: NewUser) -> StoreResult<User>;

    /// Persist every mutable column of `user`
    async fn update(&self, user: &User) -> StoreResult<User>;

    /// Persist only the self-service columns of `user` (email, names, phone,
    /// birth date); role, active flag and credentials keep their stored values
    async fn update_profile(&self, user: &User) -> StoreResult<User>;

    /// Returns `false` when no such user existed
    async fn delete(&self, id: i64) -> StoreResult<bool>;

    async fn count(&self) -> StoreResult<i64>;

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Role records
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_role(&self, id: i64) -> StoreResult<Option<Role>>;

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;

    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    async fn create_role(&self, new_role: NewRole) -> StoreResult<Role>;

    /// Fails with [`StoreError::RoleInUse`] while any user references the role
    async fn delete_role(&self, id: i64) -> StoreResult<bool>;
}
