//! Role-based user management service
//!
//! JWT login, logout, refresh and "who am I", an access control gate keyed on
//! the caller's role (Admin, Estudiante, Empresa), and admin CRUD over user
//! accounts.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use accounts::{AppState, blacklist::MemoryBlacklist, jwt::{JwtConfig, TokenService}};
//! use accounts::repositories::MemoryStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let tokens = TokenService::new(
//!     JwtConfig::with_secret("change-me"),
//!     Arc::new(MemoryBlacklist::new()),
//! )?;
//!
//! let state = AppState::new(store.clone(), store, tokens);
//! let app = accounts::routes::create_router(state, &["http://localhost:5173".to_string()]);
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod blacklist;
pub mod database;
pub mod error;
pub mod extract;
pub mod gate;
pub mod jwt;
pub mod models;
pub mod password;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod settings;
pub mod state;
pub mod validation;

pub use state::AppState;
