//! Schema creation and start-up seeding

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::models::{NewUser, RoleName};
use crate::password::hash_password;
use crate::repositories::{RoleRepository, UserRepository};
use crate::settings::BootstrapAdmin;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(50) NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(150) NOT NULL UNIQUE,
        email VARCHAR(254) NOT NULL DEFAULT '',
        password_hash TEXT,
        first_name VARCHAR(150) NOT NULL DEFAULT '',
        last_name VARCHAR(150) NOT NULL DEFAULT '',
        phone VARCHAR(15),
        birth_date DATE,
        contract_date DATE,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
        role_id BIGINT REFERENCES roles(id) ON DELETE RESTRICT,
        date_joined TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_login TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS users_email_idx ON users (email)",
    "CREATE INDEX IF NOT EXISTS users_date_joined_idx ON users (date_joined DESC)",
];

/// Create the `roles` and `users` tables if they do not exist yet
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Applying account schema");

    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Make sure every canonical role exists. Existing rows are left untouched.
pub async fn seed_roles(roles: &dyn RoleRepository) -> Result<()> {
    for role_name in RoleName::ALL {
        if roles.find_role_by_name(role_name.as_str()).await?.is_none() {
            roles.create_role(role_name.new_role()).await?;
            info!("Seeded role {}", role_name);
        }
    }

    Ok(())
}

/// Create an Admin superuser when the store has no users at all.
///
/// Returns whether a user was created.
pub async fn ensure_bootstrap_admin(
    users: &dyn UserRepository,
    roles: &dyn RoleRepository,
    admin: &BootstrapAdmin,
) -> Result<bool> {
    if users.count().await? > 0 {
        return Ok(false);
    }

    let role = roles
        .find_role_by_name(RoleName::Admin.as_str())
        .await?
        .ok_or_else(|| anyhow::anyhow!("Admin role is missing; seed roles first"))?;

    let user = users
        .create(NewUser {
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: Some(hash_password(&admin.password)?),
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            birth_date: None,
            contract_date: None,
            is_active: true,
            is_superuser: true,
            role_id: Some(role.id),
        })
        .await?;

    info!("Created bootstrap admin {}", user.username);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::verify_password;
    use crate::repositories::MemoryStore;

    fn bootstrap() -> BootstrapAdmin {
        BootstrapAdmin {
            username: "admin".to_string(),
            email: "admin@test.com".to_string(),
            password: "admin123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seed_roles_is_idempotent() {
        let store = MemoryStore::new();

        seed_roles(&store).await.unwrap();
        seed_roles(&store).await.unwrap();

        let roles = store.list_roles().await.unwrap();
        let names: Vec<_> = roles.iter().map(|role| role.name.as_str()).collect();
        assert_eq!(names, vec!["Admin", "Estudiante", "Empresa"]);
        assert_eq!(
            roles[0].description.as_deref(),
            Some("Administrador del sistema")
        );
    }

    #[tokio::test]
    async fn test_bootstrap_admin_only_on_empty_store() {
        let store = MemoryStore::new();
        seed_roles(&store).await.unwrap();

        assert!(ensure_bootstrap_admin(&store, &store, &bootstrap()).await.unwrap());
        assert!(!ensure_bootstrap_admin(&store, &store, &bootstrap()).await.unwrap());

        let admin = store.find_by_username("admin").await.unwrap().unwrap();
        assert!(admin.is_superuser);
        assert_eq!(admin.role_name(), Some("Admin"));
        assert!(verify_password("admin123", admin.password_hash.as_deref().unwrap()).unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_requires_roles() {
        let store = MemoryStore::new();
        assert!(ensure_bootstrap_admin(&store, &store, &bootstrap()).await.is_err());
    }
}
