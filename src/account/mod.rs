/// Account management system
///
/// Handles signup with email verification, password login and account lookup.

mod manager;
pub mod password;

pub use manager::{AccountManager, SignupOutcome};

use crate::db::account::AccountView;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Signup response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: String,
    pub email: String,
    pub is_verified: bool,
}

/// Email verification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Minimal user summary returned with a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Session response (login and verified signup)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserSummary,
}

impl SessionResponse {
    pub fn new(token: String, account: &AccountView) -> Self {
        Self {
            token,
            user: UserSummary {
                id: account.id.clone(),
                name: account.name.clone(),
                email: account.email.clone(),
            },
        }
    }
}

/// Canonical form of an email address: trimmed and lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn test_signup_request_validation() {
        let ok = SignupRequest {
            name: "Alice".to_string(),
            email: "a@x.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short = SignupRequest {
            password: "12345".to_string(),
            ..ok.clone()
        };
        assert!(short.validate().is_err());

        let bad_email = SignupRequest {
            email: "not-an-email".to_string(),
            ..ok.clone()
        };
        assert!(bad_email.validate().is_err());

        let no_name = SignupRequest {
            name: String::new(),
            ..ok
        };
        assert!(no_name.validate().is_err());
    }
}
