//! Self-service profile

use std::sync::Arc;
use tracing::info;

use super::admin::validate_profile_fields;
use crate::error::{ApiError, ApiResult};
use crate::models::{ProfileUpdate, User, UserView};
use crate::repositories::UserRepository;

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UserRepository>,
}

impl ProfileService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    pub fn view(&self, actor: &User) -> UserView {
        info!("Profile viewed: {}", actor.username);
        UserView::from(actor)
    }

    /// Change the caller's own contact fields. Role, active flag and
    /// password are not reachable from here.
    pub async fn update(&self, actor: &User, update: ProfileUpdate) -> ApiResult<UserView> {
        let Some(mut user) = self.users.find_by_id(actor.id).await? else {
            return Err(ApiError::not_found("User not found"));
        };

        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = update.telefono {
            user.phone = phone;
        }
        if let Some(birth_date) = update.fecha_nacimiento {
            user.birth_date = birth_date;
        }

        validate_profile_fields(
            &user.email,
            &user.first_name,
            &user.last_name,
            user.phone.as_deref(),
        )?;

        let user = self.users.update_profile(&user).await?;
        info!("Profile updated: {}", user.username);
        Ok(UserView::from(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::repositories::MemoryStore;

    async fn student(store: &MemoryStore) -> User {
        store
            .create(NewUser {
                username: "estudiante1".to_string(),
                email: "estudiante1@test.com".to_string(),
                password_hash: Some("$argon2id$placeholder".to_string()),
                first_name: "Ana".to_string(),
                last_name: String::new(),
                phone: None,
                birth_date: None,
                contract_date: None,
                is_active: true,
                is_superuser: false,
                role_id: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_changes_only_supplied_fields() {
        let store = MemoryStore::new();
        let actor = student(&store).await;
        let profile = ProfileService::new(Arc::new(store.clone()));

        let update: ProfileUpdate = serde_json::from_str(
            r#"{"last_name": "Gomez", "telefono": "3001234567", "fecha_nacimiento": "2002-05-01"}"#,
        )
        .unwrap();
        let view = profile.update(&actor, update).await.unwrap();

        assert_eq!(view.first_name, "Ana");
        assert_eq!(view.last_name, "Gomez");
        assert_eq!(view.telefono.as_deref(), Some("3001234567"));
        assert_eq!(view.fecha_nacimiento.map(|d| d.to_string()).as_deref(), Some("2002-05-01"));

        let stored = store.find_by_id(actor.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, actor.password_hash);
        assert!(stored.is_active);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_email() {
        let store = MemoryStore::new();
        let actor = student(&store).await;
        let profile = ProfileService::new(Arc::new(store.clone()));

        let update = ProfileUpdate {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            profile.update(&actor, update).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_update_keeps_concurrent_admin_changes() {
        let store = MemoryStore::new();
        let actor = student(&store).await;
        let profile = ProfileService::new(Arc::new(store.clone()));

        let mut changed = store.find_by_id(actor.id).await.unwrap().unwrap();
        changed.is_active = false;
        changed.password_hash = Some("$argon2id$rotated".to_string());
        store.update(&changed).await.unwrap();

        let update = ProfileUpdate {
            first_name: Some("Ana Maria".to_string()),
            ..Default::default()
        };
        let view = profile.update(&actor, update).await.unwrap();
        assert_eq!(view.first_name, "Ana Maria");
        assert!(!view.is_active);

        let stored = store.find_by_id(actor.id).await.unwrap().unwrap();
        assert!(!stored.is_active);
        assert_eq!(stored.password_hash.as_deref(), Some("$argon2id$rotated"));
        assert_eq!(stored.first_name, "Ana Maria");
    }

    #[tokio::test]
    async fn test_update_of_deleted_user_is_not_found() {
        let store = MemoryStore::new();
        let actor = student(&store).await;
        let profile = ProfileService::new(Arc::new(store.clone()));
        store.delete(actor.id).await.unwrap();

        assert!(matches!(
            profile.update(&actor, ProfileUpdate::default()).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
