//! In-memory credential store
//!
//! Same contract as the PostgreSQL store: unique usernames and role names,
//! roles cannot be deleted while referenced, listings newest first. State is
//! lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{RoleRepository, StoreError, StoreResult, UserRepository};
use crate::models::{NewRole, NewUser, Role, User, UserFilter};

#[derive(Debug, Default)]
struct Tables {
    roles: BTreeMap<i64, Role>,
    users: BTreeMap<i64, User>,
    next_role_id: i64,
    next_user_id: i64,
}

impl Tables {
    fn resolve_role(&self, role_id: Option<i64>) -> StoreResult<Option<Role>> {
        match role_id {
            None => Ok(None),
            Some(id) => self
                .roles
                .get(&id)
                .cloned()
                .map(Some)
                .ok_or_else(|| StoreError::Conflict("Referenced role does not exist".to_string())),
        }
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|user| user.username == username && Some(user.id) != except)
    }
}

/// Credential store kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        // BTreeMap iterates in id order, so the first hit is the oldest account
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|user| filter.matches(user))
            .cloned()
            .collect();

        users.sort_by(|a, b| {
            b.date_joined
                .cmp(&a.date_joined)
                .then_with(|| b.id.cmp(&a.id))
        });

        Ok(users)
    }

    async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        if tables.username_taken(&new_user.username, None) {
            return Err(StoreError::Conflict(
                "A user with that username already exists".to_string(),
            ));
        }

        let role = tables.resolve_role(new_user.role_id)?;

        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            phone: new_user.phone,
            birth_date: new_user.birth_date,
            contract_date: new_user.contract_date,
            is_active: new_user.is_active,
            is_superuser: new_user.is_superuser,
            role,
            date_joined: Utc::now(),
            last_login: None,
        };

        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        let Some(existing) = tables.users.get(&user.id) else {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        };
        let date_joined = existing.date_joined;
        let last_login = existing.last_login;

        if tables.username_taken(&user.username, Some(user.id)) {
            return Err(StoreError::Conflict(
                "A user with that username already exists".to_string(),
            ));
        }

        let role = tables.resolve_role(user.role_id())?;

        let updated = User {
            role,
            date_joined,
            last_login,
            ..user.clone()
        };
        tables.users.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn update_profile(&self, user: &User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        let Some(stored) = tables.users.get_mut(&user.id) else {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        };

        stored.email = user.email.clone();
        stored.first_name = user.first_name.clone();
        stored.last_name = user.last_name.clone();
        stored.phone = user.phone.clone();
        stored.birth_date = user.birth_date;

        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        Ok(self.tables.write().await.users.remove(&id).is_some())
    }

    async fn count(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.tables.write().await.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn find_role(&self, id: i64) -> StoreResult<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|role| role.name == name).cloned())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.tables.read().await.roles.values().cloned().collect())
    }

    async fn create_role(&self, new_role: NewRole) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;

        if tables.roles.values().any(|role| role.name == new_role.name) {
            return Err(StoreError::Conflict(format!(
                "Role {} already exists",
                new_role.name
            )));
        }

        tables.next_role_id += 1;
        let role = Role {
            id: tables.next_role_id,
            name: new_role.name,
            description: new_role.description,
        };

        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn delete_role(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;

        let Some(role) = tables.roles.get(&id) else {
            return Ok(false);
        };

        if tables.users.values().any(|user| user.role_id() == Some(id)) {
            return Err(StoreError::RoleInUse(role.name.clone()));
        }

        tables.roles.remove(&id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoleName;

    fn new_user(username: &str, email: &str, role_id: Option<i64>) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: None,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            birth_date: None,
            contract_date: None,
            is_active: true,
            is_superuser: false,
            role_id,
        }
    }

    async fn seeded() -> (MemoryStore, Role) {
        let store = MemoryStore::new();
        let role = store
            .create_role(RoleName::Estudiante.new_role())
            .await
            .unwrap();
        (store, role)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (store, role) = seeded().await;

        let user = store
            .create(new_user("bob", "bob@test.com", Some(role.id)))
            .await
            .unwrap();

        assert_eq!(user.role, Some(role));
        assert_eq!(
            store.find_by_username("bob").await.unwrap().map(|u| u.id),
            Some(user.id)
        );
        assert_eq!(
            store.find_by_email("bob@test.com").await.unwrap().map(|u| u.id),
            Some(user.id)
        );
        assert!(store.find_by_username("Bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_is_unique() {
        let (store, _) = seeded().await;

        store.create(new_user("bob", "", None)).await.unwrap();
        let result = store.create(new_user("bob", "", None)).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shared_email_resolves_to_oldest() {
        let (store, _) = seeded().await;

        let first = store.create(new_user("one", "same@test.com", None)).await.unwrap();
        store.create(new_user("two", "same@test.com", None)).await.unwrap();

        let found = store.find_by_email("same@test.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_unknown_role_is_rejected() {
        let (store, _) = seeded().await;

        let result = store.create(new_user("bob", "", Some(99))).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filters() {
        let (store, role) = seeded().await;

        let older = store.create(new_user("alice", "", Some(role.id))).await.unwrap();
        let newer = store.create(new_user("bob", "", None)).await.unwrap();

        let all = store.list(&UserFilter::default()).await.unwrap();
        assert_eq!(
            all.iter().map(|u| u.id).collect::<Vec<_>>(),
            vec![newer.id, older.id]
        );

        let students = store
            .list(&UserFilter {
                role_id: Some(role.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].username, "alice");
    }

    #[tokio::test]
    async fn test_update_keeps_join_date_and_resolves_role() {
        let (store, role) = seeded().await;
        let user = store.create(new_user("bob", "", None)).await.unwrap();

        let mut changed = user.clone();
        changed.email = "bob@test.com".to_string();
        changed.role = Some(role.clone());

        let updated = store.update(&changed).await.unwrap();
        assert_eq!(updated.email, "bob@test.com");
        assert_eq!(updated.role, Some(role));
        assert_eq!(updated.date_joined, user.date_joined);
    }

    #[tokio::test]
    async fn test_role_in_use_cannot_be_deleted() {
        let (store, role) = seeded().await;
        let user = store.create(new_user("bob", "", Some(role.id))).await.unwrap();

        let result = store.delete_role(role.id).await;
        assert!(matches!(result, Err(StoreError::RoleInUse(name)) if name == "Estudiante"));

        assert!(store.delete(user.id).await.unwrap());
        assert!(store.delete_role(role.id).await.unwrap());
        assert!(!store.delete_role(role.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_role_names_are_unique() {
        let (store, _) = seeded().await;

        let result = store.create_role(RoleName::Estudiante.new_role()).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.list_roles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_login() {
        let (store, _) = seeded().await;
        let user = store.create(new_user("bob", "", None)).await.unwrap();
        assert!(user.last_login.is_none());

        let now = Utc::now();
        store.record_login(user.id, now).await.unwrap();

        let reloaded = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.last_login, Some(now));
    }
}
