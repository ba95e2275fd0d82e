//! Account service models

pub mod role;
pub mod user;

pub use role::{NewRole, Role, RoleName};
pub use user::{NewUser, ProfileUpdate, User, UserFilter, UserPayload, UserView};
