//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

pub const USERNAME_MAX_LEN: usize = 150;
pub const NAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PHONE_MAX_LEN: usize = 15;

/// Validate username: required, letters, digits and `@ . + - _` only
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("username: this field is required".to_string());
    }

    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!(
            "username: must be at most {} characters long",
            USERNAME_MAX_LEN
        ));
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err(
            "username: may only contain letters, numbers and @/./+/-/_ characters".to_string(),
        );
    }

    Ok(())
}

/// Validate email. Empty is allowed; anything else must look like an address.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Ok(());
    }

    if email.len() > EMAIL_MAX_LEN {
        return Err(format!(
            "email: must be at most {} characters long",
            EMAIL_MAX_LEN
        ));
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("email: enter a valid email address".to_string());
    }

    Ok(())
}

/// Validate a first or last name
pub fn validate_name(field: &str, value: &str) -> Result<(), String> {
    if value.chars().count() > NAME_MAX_LEN {
        return Err(format!(
            "{}: must be at most {} characters long",
            field, NAME_MAX_LEN
        ));
    }

    Ok(())
}

/// Validate phone number length
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.chars().count() > PHONE_MAX_LEN {
        return Err(format!(
            "telefono: must be at most {} characters long",
            PHONE_MAX_LEN
        ));
    }

    Ok(())
}
