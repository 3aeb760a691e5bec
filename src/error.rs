/// Unified error types for the PantryIQ server
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum PantryError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Signup with an email that already has an account
    #[error("An account already exists with this email")]
    DuplicateAccount,

    /// Invite for an email already present in the inviter's family
    #[error("Member already in family")]
    DuplicateMember,

    /// Unknown email or wrong password. The message is identical for both.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Password matched but the email was never verified
    #[error("Please verify your email first")]
    UnverifiedAccount,

    /// Missing, malformed, expired or forged session token
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Resource exists but belongs to another account
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Email verification attempted on a verified account
    #[error("Account already verified")]
    AlreadyVerified,

    /// Email verification code mismatch
    #[error("Invalid verification code")]
    InvalidCode,

    /// Invite token unknown or already consumed
    #[error("Invalid or expired invitation link")]
    InvalidToken,

    /// Email or AI provider failure
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),
}

impl PantryError {
    /// Machine-readable error code used in response bodies and metrics
    pub fn code(&self) -> &'static str {
        match self {
            PantryError::Validation(_) => "ValidationError",
            PantryError::DuplicateAccount => "DuplicateAccount",
            PantryError::DuplicateMember => "DuplicateMember",
            PantryError::InvalidCredentials => "InvalidCredentials",
            PantryError::UnverifiedAccount => "UnverifiedAccount",
            PantryError::Unauthenticated(_) => "AuthenticationRequired",
            PantryError::Forbidden(_) => "Forbidden",
            PantryError::NotFound(_) => "NotFound",
            PantryError::AlreadyVerified => "AlreadyVerified",
            PantryError::InvalidCode => "InvalidCode",
            PantryError::InvalidToken => "InvalidToken",
            PantryError::Upstream(_) => "UpstreamServiceError",
            PantryError::RateLimitExceeded { .. } => "RateLimitExceeded",
            PantryError::Database(_)
            | PantryError::Internal(_)
            | PantryError::Io(_)
            | PantryError::Jwt(_) => "InternalServerError",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            PantryError::Validation(_)
            | PantryError::AlreadyVerified
            | PantryError::InvalidCode
            | PantryError::InvalidToken => StatusCode::BAD_REQUEST,
            PantryError::DuplicateAccount | PantryError::DuplicateMember => StatusCode::CONFLICT,
            PantryError::InvalidCredentials
            | PantryError::UnverifiedAccount
            | PantryError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            PantryError::Forbidden(_) => StatusCode::FORBIDDEN,
            PantryError::NotFound(_) => StatusCode::NOT_FOUND,
            PantryError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PantryError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            PantryError::Database(_)
            | PantryError::Internal(_)
            | PantryError::Io(_)
            | PantryError::Jwt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Only present for unverified logins so clients can route to verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

/// Convert PantryError to HTTP response
impl IntoResponse for PantryError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed with internal error");
            "Internal server error".to_string() // Don't leak details
        } else {
            self.to_string()
        };

        crate::metrics::record_error(code);

        let is_verified = match self {
            PantryError::UnverifiedAccount => Some(false),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            is_verified,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for PantryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid value for {}", field),
                })
            })
            .collect();
        messages.sort();
        PantryError::Validation(messages.join("; "))
    }
}

/// Result type alias for server operations
pub type PantryResult<T> = Result<T, PantryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PantryError::DuplicateAccount.status(), StatusCode::CONFLICT);
        assert_eq!(PantryError::UnverifiedAccount.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(PantryError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(PantryError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(PantryError::InvalidToken.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_credentials_message_is_generic() {
        assert_eq!(PantryError::InvalidCredentials.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_internal_error_does_not_leak() {
        let response = PantryError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, "Internal server error");
        assert!(body.is_verified.is_none());
    }

    #[tokio::test]
    async fn test_unverified_response_carries_flag() {
        let response = PantryError::UnverifiedAccount.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["isVerified"], serde_json::json!(false));
        assert_eq!(body["error"], "UnverifiedAccount");
    }
}
