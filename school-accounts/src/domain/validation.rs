//! Field-level validation and normalization for user records.
//!
//! Everything here runs before a write is attempted, so a record that
//! fails validation never reaches the hashing step or the store.

use crate::domain::error::ValidationError;
use crate::domain::user::Role;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Trims and lowercases an email address, then checks its shape.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    let malformed = || ValidationError::InvalidEmail(raw.to_string());
    if email.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    let (local, domain) = email.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(malformed());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(malformed());
    }

    Ok(email)
}

pub fn normalize_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    Ok(name.to_string())
}

/// Length is counted in UTF-16 code units of the plaintext, before hashing,
/// so a character outside the BMP counts twice.
pub fn validate_password(plain: &str) -> Result<(), ValidationError> {
    if plain.is_empty() {
        return Err(ValidationError::MissingField("password"));
    }
    let actual = plain.encode_utf16().count();
    if actual < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
            actual,
        });
    }
    Ok(())
}

pub fn parse_role(raw: &str) -> Result<Role, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::MissingField("role"));
    }
    raw.parse()
}

pub fn normalize_avatar(raw: Option<String>) -> Option<String> {
    raw.map(|a| a.trim().to_string()).filter(|a| !a.is_empty())
}
