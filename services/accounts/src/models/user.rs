//! User model and related functionality

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Role;

/// User entity
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; `None` means the account has no usable password
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub contract_date: Option<NaiveDate>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub role: Option<Role>,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn role_name(&self) -> Option<&str> {
        self.role.as_ref().map(|role| role.name.as_str())
    }

    pub fn role_id(&self) -> Option<i64> {
        self.role.as_ref().map(|role| role.id)
    }
}

/// New user creation payload, with the password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub contract_date: Option<NaiveDate>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub role_id: Option<i64>,
}

/// Public projection of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub telefono: Option<String>,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub fecha_contrato: Option<NaiveDate>,
    pub role: Option<Role>,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            telefono: user.phone.clone(),
            fecha_nacimiento: user.birth_date,
            fecha_contrato: user.contract_date,
            role: user.role.clone(),
            is_active: user.is_active,
            date_joined: user.date_joined,
            last_login: user.last_login,
        }
    }
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// Write payload shared by admin create, full update and partial update.
///
/// Nullable fields use `Option<Option<_>>`: the outer `None` means the key was
/// absent, `Some(None)` means it was sent as `null` (or an empty string).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable_text")]
    pub telefono: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub fecha_nacimiento: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub fecha_contrato: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub rol_id: Option<i64>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable_text")]
    pub telefono: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable_date")]
    pub fecha_nacimiento: Option<Option<NaiveDate>>,
}

/// Filters accepted by the admin user listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role_id: Option<i64>,
    pub active: Option<bool>,
}

impl UserFilter {
    /// In-process evaluation of the filter, mirroring the SQL predicate
    pub fn matches(&self, user: &User) -> bool {
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [
                &user.username,
                &user.email,
                &user.first_name,
                &user.last_name,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(role_id) = self.role_id {
            if user.role_id() != Some(role_id) {
                return false;
            }
        }

        if let Some(active) = self.active {
            if user.is_active != active {
                return false;
            }
        }

        true
    }
}

fn nullable_text<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(value.filter(|text| !text.trim().is_empty())))
}

fn nullable_date<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(Some(None)),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(|date| Some(Some(date)))
            .map_err(|_| {
                serde::de::Error::custom(format!(
                    "invalid date '{}', expected YYYY-MM-DD",
                    text
                ))
            }),
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("rol_id must be an integer")),
        Some(serde_json::Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom("rol_id must be an integer")),
        Some(_) => Err(serde::de::Error::custom("rol_id must be an integer")),
    }
}
