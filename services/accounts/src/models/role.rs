//! Role model and related functionality

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role entity
///
/// Serialized as `{id, name, descripcion}`, which is also the public role view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
}

/// New role creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

/// The role names the service knows how to gate on.
///
/// Role records are free-form rows, so gates compare against `Role::name`;
/// this enum only names the sets used at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleName {
    Admin,
    Estudiante,
    Empresa,
}

impl RoleName {
    /// Every canonical role, in seeding order
    pub const ALL: [RoleName; 3] = [RoleName::Admin, RoleName::Estudiante, RoleName::Empresa];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "Admin",
            RoleName::Estudiante => "Estudiante",
            RoleName::Empresa => "Empresa",
        }
    }

    /// Description stored when the role is seeded
    pub fn description(&self) -> &'static str {
        match self {
            RoleName::Admin => "Administrador del sistema",
            RoleName::Estudiante => "Estudiante",
            RoleName::Empresa => "Empresa",
        }
    }

    pub fn matches(&self, role_name: &str) -> bool {
        self.as_str() == role_name
    }

    pub fn new_role(&self) -> NewRole {
        NewRole {
            name: self.as_str().to_string(),
            description: Some(self.description().to_string()),
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
