//! PostgreSQL credential store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::{debug, info};

use super::{RoleRepository, StoreError, StoreResult, UserRepository};
use crate::models::{NewRole, NewUser, Role, User, UserFilter};

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.first_name, u.last_name,
           u.phone, u.birth_date, u.contract_date, u.is_active, u.is_superuser,
           u.date_joined, u.last_login,
           r.id AS role_id, r.name AS role_name, r.description AS role_description
    FROM users u
    LEFT JOIN roles r ON r.id = u.role_id
"#;

fn row_to_user(row: &PgRow) -> Result<User, sqlx::Error> {
    let role_id: Option<i64> = row.try_get("role_id")?;
    let role = match role_id {
        Some(id) => Some(Role {
            id,
            name: row.try_get("role_name")?,
            description: row.try_get("role_description")?,
        }),
        None => None,
    };

    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        birth_date: row.try_get("birth_date")?,
        contract_date: row.try_get("contract_date")?,
        is_active: row.try_get("is_active")?,
        is_superuser: row.try_get("is_superuser")?,
        role,
        date_joined: row.try_get("date_joined")?,
        last_login: row.try_get("last_login")?,
    })
}

fn row_to_role(row: &PgRow) -> Result<Role, sqlx::Error> {
    Ok(Role {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

/// Escape `%`, `_` and `\` so user search text matches literally in ILIKE
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn map_user_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_error) = &e {
        if db_error.is_unique_violation() {
            return StoreError::Conflict("A user with that username already exists".to_string());
        }
        if db_error.is_foreign_key_violation() {
            return StoreError::Conflict("Referenced role does not exist".to_string());
        }
    }
    StoreError::Database(e)
}

/// User repository backed by the `users` table
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let mut query = QueryBuilder::<Postgres>::new(USER_SELECT);
        query
            .push(format!(" WHERE u.{} = ", column))
            .push_bind(value)
            .push(" ORDER BY u.id ASC LIMIT 1");

        let row = query.build().fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_user).transpose()?)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        debug!("Finding user by ID: {}", id);

        let mut query = QueryBuilder::<Postgres>::new(USER_SELECT);
        query.push(" WHERE u.id = ").push_bind(id);

        let row = query.build().fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_user).transpose()?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        debug!("Finding user by username: {}", username);
        self.fetch_one_by("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        debug!("Finding user by email: {}", email);
        self.fetch_one_by("email", email).await
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let mut query = QueryBuilder::<Postgres>::new(USER_SELECT);
        query.push(" WHERE TRUE");

        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            query
                .push(" AND (u.username ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.email ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.last_name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        if let Some(role_id) = filter.role_id {
            query.push(" AND u.role_id = ").push_bind(role_id);
        }

        if let Some(active) = filter.active {
            query.push(" AND u.is_active = ").push_bind(active);
        }

        query.push(" ORDER BY u.date_joined DESC, u.id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        let users = rows
            .iter()
            .map(row_to_user)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        info!("Creating new user: {}", new_user.username);

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name,
                               phone, birth_date, contract_date, is_active, is_superuser, role_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.phone)
        .bind(new_user.birth_date)
        .bind(new_user.contract_date)
        .bind(new_user.is_active)
        .bind(new_user.is_superuser)
        .bind(new_user.role_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_write_error)?;

        let id: i64 = row.try_get("id")?;
        self.find_by_id(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        info!("Updating user {}", user.id);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = $4, first_name = $5,
                last_name = $6, phone = $7, birth_date = $8, contract_date = $9,
                is_active = $10, is_superuser = $11, role_id = $12
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.birth_date)
        .bind(user.contract_date)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(user.role_id())
        .execute(&self.pool)
        .await
        .map_err(map_user_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        self.find_by_id(user.id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_profile(&self, user: &User) -> StoreResult<User> {
        info!("Updating profile of user {}", user.id);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, first_name = $3, last_name = $4, phone = $5, birth_date = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.birth_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        self.find_by_id(user.id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        info!("Deleting user {}", id);

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Role repository backed by the `roles` table
#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn find_role(&self, id: i64) -> StoreResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_role).transpose()?)
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_role).transpose()?)
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_role).collect::<Result<Vec<_>, _>>()?)
    }

    async fn create_role(&self, new_role: NewRole) -> StoreResult<Role> {
        info!("Creating role: {}", new_role.name);

        let row = sqlx::query(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(&new_role.name)
        .bind(&new_role.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_error) = &e {
                if db_error.is_unique_violation() {
                    return StoreError::Conflict(format!("Role {} already exists", new_role.name));
                }
            }
            StoreError::Database(e)
        })?;

        Ok(row_to_role(&row)?)
    }

    async fn delete_role(&self, id: i64) -> StoreResult<bool> {
        let Some(role) = self.find_role(id).await? else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_error) = &e {
                    if db_error.is_foreign_key_violation() {
                        return StoreError::RoleInUse(role.name.clone());
                    }
                }
                StoreError::Database(e)
            })?;

        Ok(result.rows_affected() > 0)
    }
}
