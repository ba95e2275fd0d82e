//! User administration: CRUD, activation toggling and role listing.
//!
//! Every operation takes the acting admin so mutations can be audited and
//! self-protection rules enforced.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::models::{NewUser, Role, User, UserFilter, UserPayload, UserView};
use crate::password::hash_password;
use crate::repositories::{RoleRepository, UserRepository};
use crate::validation::{validate_email, validate_name, validate_phone, validate_username};

/// Listing body
#[derive(Debug, Clone, Serialize)]
pub struct UserList {
    pub count: usize,
    pub results: Vec<UserView>,
}

/// Activation toggle body
#[derive(Debug, Clone, Serialize)]
pub struct ToggleResult {
    pub is_active: bool,
    pub message: String,
}

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
}

impl AdminService {
    pub fn new(users: Arc<dyn UserRepository>, roles: Arc<dyn RoleRepository>) -> Self {
        Self { users, roles }
    }

    pub async fn list(&self, actor: &User, filter: &UserFilter) -> ApiResult<UserList> {
        let users = self.users.list(filter).await?;
        info!("Admin {} listed users", actor.username);

        Ok(UserList {
            count: users.len(),
            results: users.into_iter().map(UserView::from).collect(),
        })
    }

    pub async fn create(&self, actor: &User, payload: UserPayload) -> ApiResult<UserView> {
        let Some(role_id) = payload.rol_id else {
            return Err(ApiError::bad_request("rol_id: a role is required"));
        };
        let role = self.resolve_role(role_id).await?;

        let username = payload.username.unwrap_or_default();
        validate_username(&username).map_err(ApiError::BadRequest)?;

        let new_user = NewUser {
            username,
            email: payload.email.unwrap_or_default(),
            password_hash: hash_optional(payload.password.as_deref())?,
            first_name: payload.first_name.unwrap_or_default(),
            last_name: payload.last_name.unwrap_or_default(),
            phone: payload.telefono.flatten(),
            birth_date: payload.fecha_nacimiento.flatten(),
            contract_date: payload.fecha_contrato.flatten(),
            is_active: payload.is_active.unwrap_or(true),
            is_superuser: false,
            role_id: Some(role.id),
        };
        validate_profile_fields(
            &new_user.email,
            &new_user.first_name,
            &new_user.last_name,
            new_user.phone.as_deref(),
        )?;

        let user = self.users.create(new_user).await?;
        info!("Admin {} created user {}", actor.username, user.username);

        Ok(UserView::from(user))
    }

    pub async fn retrieve(&self, actor: &User, id: i64) -> ApiResult<UserView> {
        let user = self.find_user(id).await?;
        info!("Admin {} retrieved user {}", actor.username, user.username);
        Ok(UserView::from(user))
    }

    /// Full replace: optional fields left out of the payload are cleared.
    /// `is_active` is kept when omitted.
    pub async fn update(&self, actor: &User, id: i64, payload: UserPayload) -> ApiResult<UserView> {
        let current = self.find_user(id).await?;
        refuse_self_deactivation(actor, &current, payload.is_active)?;

        let Some(role_id) = payload.rol_id else {
            return Err(ApiError::bad_request("rol_id: a role is required"));
        };
        let role = self.resolve_role(role_id).await?;
        warn_on_self_role_change(actor, &current, &role);

        let username = payload.username.unwrap_or_default();
        validate_username(&username).map_err(ApiError::BadRequest)?;

        let password_hash = match hash_optional(payload.password.as_deref())? {
            Some(hash) => Some(hash),
            None => current.password_hash.clone(),
        };

        let user = User {
            username,
            email: payload.email.unwrap_or_default(),
            password_hash,
            first_name: payload.first_name.unwrap_or_default(),
            last_name: payload.last_name.unwrap_or_default(),
            phone: payload.telefono.flatten(),
            birth_date: payload.fecha_nacimiento.flatten(),
            contract_date: payload.fecha_contrato.flatten(),
            is_active: payload.is_active.unwrap_or(current.is_active),
            role: Some(role),
            ..current
        };

        self.save(actor, user).await
    }

    /// Only the fields present in the payload change
    pub async fn partial_update(
        &self,
        actor: &User,
        id: i64,
        payload: UserPayload,
    ) -> ApiResult<UserView> {
        let mut user = self.find_user(id).await?;
        refuse_self_deactivation(actor, &user, payload.is_active)?;

        if let Some(role_id) = payload.rol_id {
            let role = self.resolve_role(role_id).await?;
            warn_on_self_role_change(actor, &user, &role);
            user.role = Some(role);
        }

        if let Some(username) = payload.username {
            validate_username(&username).map_err(ApiError::BadRequest)?;
            user.username = username;
        }
        if let Some(email) = payload.email {
            user.email = email;
        }
        if let Some(first_name) = payload.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = payload.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = payload.telefono {
            user.phone = phone;
        }
        if let Some(birth_date) = payload.fecha_nacimiento {
            user.birth_date = birth_date;
        }
        if let Some(contract_date) = payload.fecha_contrato {
            user.contract_date = contract_date;
        }
        if let Some(is_active) = payload.is_active {
            user.is_active = is_active;
        }
        if let Some(hash) = hash_optional(payload.password.as_deref())? {
            user.password_hash = Some(hash);
        }

        self.save(actor, user).await
    }

    pub async fn delete(&self, actor: &User, id: i64) -> ApiResult<()> {
        let user = self.find_user(id).await?;

        if user.id == actor.id {
            warn!("Admin {} attempted to delete their own account", actor.username);
            return Err(ApiError::bad_request("You cannot delete your own account"));
        }

        if !self.users.delete(user.id).await? {
            return Err(ApiError::not_found("User not found"));
        }

        info!("Admin {} deleted user {}", actor.username, user.username);
        Ok(())
    }

    pub async fn toggle_active(&self, actor: &User, id: i64) -> ApiResult<ToggleResult> {
        let mut user = self.find_user(id).await?;

        if user.id == actor.id {
            warn!(
                "Admin {} attempted to toggle their own account",
                actor.username
            );
            return Err(ApiError::bad_request("You cannot deactivate your own account"));
        }

        user.is_active = !user.is_active;
        let user = self.users.update(&user).await?;

        let state = if user.is_active { "activated" } else { "deactivated" };
        info!("Admin {} {} user {}", actor.username, state, user.username);

        Ok(ToggleResult {
            is_active: user.is_active,
            message: format!("User {} successfully", state),
        })
    }

    pub async fn list_roles(&self, actor: &User) -> ApiResult<Vec<Role>> {
        let roles = self.roles.list_roles().await?;
        info!("Admin {} listed roles", actor.username);
        Ok(roles)
    }

    async fn find_user(&self, id: i64) -> ApiResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    async fn resolve_role(&self, role_id: i64) -> ApiResult<Role> {
        self.roles
            .find_role(role_id)
            .await?
            .ok_or_else(|| ApiError::bad_request(format!("rol_id: invalid role {}", role_id)))
    }

    async fn save(&self, actor: &User, user: User) -> ApiResult<UserView> {
        validate_profile_fields(
            &user.email,
            &user.first_name,
            &user.last_name,
            user.phone.as_deref(),
        )?;

        let user = self.users.update(&user).await?;
        info!("Admin {} updated user {}", actor.username, user.username);
        Ok(UserView::from(user))
    }
}

pub(crate) fn validate_profile_fields(
    email: &str,
    first_name: &str,
    last_name: &str,
    phone: Option<&str>,
) -> ApiResult<()> {
    validate_email(email).map_err(ApiError::BadRequest)?;
    validate_name("first_name", first_name).map_err(ApiError::BadRequest)?;
    validate_name("last_name", last_name).map_err(ApiError::BadRequest)?;
    if let Some(phone) = phone {
        validate_phone(phone).map_err(ApiError::BadRequest)?;
    }
    Ok(())
}

/// Empty passwords are treated as absent
/// Admins may never switch their own account off, whichever endpoint they use
fn refuse_self_deactivation(
    actor: &User,
    target: &User,
    is_active: Option<bool>,
) -> ApiResult<()> {
    if target.id == actor.id && is_active == Some(false) {
        warn!(
            "Admin {} attempted to deactivate their own account",
            actor.username
        );
        return Err(ApiError::bad_request("You cannot deactivate your own account"));
    }
    Ok(())
}

fn hash_optional(password: Option<&str>) -> ApiResult<Option<String>> {
    match password.filter(|password| !password.is_empty()) {
        Some(password) => hash_password(password).map(Some).map_err(|e| {
            error!("{}", e);
            ApiError::InternalServerError
        }),
        None => Ok(None),
    }
}

fn warn_on_self_role_change(actor: &User, target: &User, role: &Role) {
    if actor.id == target.id && target.role_id() != Some(role.id) {
        warn!(
            "Admin {} is changing their own role to {}",
            actor.username, role.name
        );
    }
}
