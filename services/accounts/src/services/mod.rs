//! Business operations behind the HTTP handlers

pub mod admin;
pub mod auth;
pub mod profile;

pub use admin::{AdminService, ToggleResult, UserList};
pub use auth::{AuthService, LoginResponse};
pub use profile::ProfileService;
