//! Server settings
//!
//! Defaults are layered under `ACCOUNTS_*` environment variables, e.g.
//! `ACCOUNTS_PORT=9000` or `ACCOUNTS_STORAGE=memory`.

use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Where users and roles live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Where revoked refresh tokens are tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationBackend {
    Redis,
    Memory,
}

/// Bootstrap superuser credentials, only used on an empty store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub revocation: RevocationBackend,
    pub cors_origins: String,
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl ServerSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("storage", "postgres")?
            .set_default("revocation", "redis")?
            .set_default("cors_origins", DEFAULT_CORS_ORIGINS)?
            .add_source(Environment::with_prefix("ACCOUNTS").try_parsing(true))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build configuration: {}", e))?;

        settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Allowed CORS origins, blanks dropped
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Bootstrap admin, present only when username and password are both set
    pub fn bootstrap_admin(&self) -> Option<BootstrapAdmin> {
        let username = self.bootstrap_admin_username.as_deref()?.trim();
        let password = self.bootstrap_admin_password.as_deref()?;

        if username.is_empty() || password.is_empty() {
            return None;
        }

        Some(BootstrapAdmin {
            username: username.to_string(),
            email: self.bootstrap_admin_email.clone().unwrap_or_default(),
            password: password.to_string(),
        })
    }
}
