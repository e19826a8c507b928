//! Input checks shared by the services.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]{3,32}$").expect("username pattern is valid"));

pub const MIN_PASSWORD_LEN: usize = 8;

/// Trim a required string field, rejecting missing or blank values.
pub fn required(field: &str, value: Option<&str>) -> AppResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::bad_request(format!("{field} is required"))),
    }
}

/// Trim an optional string field. Blank strings become `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Key used for case-insensitive uniqueness of names and titles.
pub fn name_key(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn normalize_username(value: &str) -> AppResult<String> {
    let username = value.trim().to_lowercase();
    if !USERNAME_RE.is_match(&username) {
        return Err(AppError::bad_request(
            "username must be 3-32 characters of letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(username)
}

pub fn normalize_email(value: &str) -> AppResult<String> {
    let email = value.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(AppError::bad_request("email is invalid"));
    }
    Ok(email)
}

pub fn check_password(value: &str) -> AppResult<()> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("title", Some("  Song ")).unwrap(), "Song");
        assert!(matches!(
            required("title", Some("   ")),
            Err(AppError::BadRequest(msg)) if msg == "title is required"
        ));
        assert!(required("title", None).is_err());
    }

    #[test]
    fn test_optional_drops_blank() {
        assert_eq!(optional(Some(" rock ".into())), Some("rock".into()));
        assert_eq!(optional(Some("  ".into())), None);
        assert_eq!(optional(None), None);
    }

    #[test]
    fn test_name_key_is_case_insensitive() {
        assert_eq!(name_key(" Daft Punk "), name_key("daft punk"));
    }

    #[test]
    fn test_username_rules() {
        assert_eq!(normalize_username("Alice_01").unwrap(), "alice_01");
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("has space").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(
            normalize_email(" Bob@Example.COM ").unwrap(),
            "bob@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(check_password("short").is_err());
        assert!(check_password("long enough").is_ok());
    }
}
