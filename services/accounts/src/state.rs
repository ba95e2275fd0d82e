//! Application state shared across handlers

use std::sync::Arc;

use crate::jwt::TokenService;
use crate::repositories::{RoleRepository, UserRepository};
use crate::services::{AdminService, AuthService, ProfileService};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub admin: AdminService,
    pub profile: ProfileService,
}

impl AppState {
    /// Wire every service onto the given stores and token service
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        tokens: TokenService,
    ) -> Self {
        Self {
            auth: AuthService::new(users.clone(), tokens),
            admin: AdminService::new(users.clone(), roles),
            profile: ProfileService::new(users),
        }
    }
}
