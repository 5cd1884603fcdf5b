//! Validated input for every write the frontend performs. Each form
//! normalizes its fields (trimming, phone mask, ISO dates) before the
//! `validator` rules run, then yields the backend write payload.

pub mod customer;
pub mod password;
pub mod payment;
pub mod profile;
pub mod sale;
pub mod signup;

use once_cell::sync::Lazy;
use regex::Regex;
use service_core::error::AppError;

/// Login names for the admin profile editor.
pub static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]{3,}$").expect("valid username regex"));

/// Login names chosen at sign-up.
pub static SIGNUP_USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._-]{2,}$").expect("valid username regex"));

pub(crate) fn invalid(message: &str) -> AppError {
    AppError::BadRequest(anyhow::anyhow!(message.to_string()))
}

/// Trimmed text, `None` when blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_becomes_none() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" Rua A ".to_string())), Some("Rua A".to_string()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn username_patterns() {
        assert!(USERNAME_RE.is_match("ana.souza"));
        assert!(!USERNAME_RE.is_match("an"));
        assert!(SIGNUP_USERNAME_RE.is_match("an"));
        assert!(!SIGNUP_USERNAME_RE.is_match("ana souza"));
    }
}
