/// Session tokens and authentication extractors
///
/// Session tokens are stateless HS256 JWTs. Validity is a function of the
/// signature and the expiry claim only; nothing is stored server-side, so a
/// token stays valid until it expires even after a password change.
use crate::{api::middleware::extract_bearer_token, context::AppContext, error::PantryError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account identifier
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and resolves session tokens with a process-wide secret
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    /// Issue a session token bound to an account
    pub fn issue(&self, account_id: &str) -> Result<String, PantryError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PantryError::Jwt(format!("Failed to generate token: {}", e)))
    }

    /// Resolve a session token to its account identifier.
    ///
    /// Pure function of the token; no database access.
    pub fn resolve(&self, token: &str) -> Result<String, PantryError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!("Session token rejected: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    PantryError::Unauthenticated("Token has expired".to_string())
                }
                ErrorKind::InvalidSignature => {
                    PantryError::Unauthenticated("Invalid token signature".to_string())
                }
                _ => PantryError::Unauthenticated("Invalid token".to_string()),
            }
        })?;

        if data.claims.sub.is_empty() {
            return Err(PantryError::Unauthenticated("Invalid token".to_string()));
        }

        Ok(data.claims.sub)
    }
}

/// Authenticated context - extracts and validates the session from a request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = PantryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            PantryError::Unauthenticated("Missing authorization header".to_string())
        })?;

        let account_id = state.sessions.resolve(&token)?;

        Ok(AuthContext { account_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-testing-only-0123456789";

    #[test]
    fn test_issue_and_resolve() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let token = issuer.issue("account-a").unwrap();
        assert_eq!(issuer.resolve(&token).unwrap(), "account-a");
    }

    #[test]
    fn test_token_never_resolves_to_other_account() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let a = issuer.issue("account-a").unwrap();
        let b = issuer.issue("account-b").unwrap();
        assert_ne!(issuer.resolve(&a).unwrap(), issuer.resolve(&b).unwrap());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let token = issuer.issue("account-a").unwrap();

        let (head, sig) = token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = sig.chars().collect();
        sig[0] = if sig[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}", head, sig.into_iter().collect::<String>());

        assert!(matches!(
            issuer.resolve(&tampered),
            Err(PantryError::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let token_a = issuer.issue("account-a").unwrap();
        let token_b = issuer.issue("account-b").unwrap();

        // B's payload under A's signature
        let parts_a: Vec<&str> = token_a.split('.').collect();
        let parts_b: Vec<&str> = token_b.split('.').collect();
        let forged = format!("{}.{}.{}", parts_a[0], parts_b[1], parts_a[2]);

        assert!(issuer.resolve(&forged).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let other = SessionIssuer::new("another-secret-key-that-is-long-enough!!", 7);
        let token = other.issue("account-a").unwrap();
        assert!(issuer.resolve(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "account-a".to_string(),
            iat: now - 8 * 24 * 3600,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        match issuer.resolve(&token) {
            Err(PantryError::Unauthenticated(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected expiry rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_token_rejected() {
        let issuer = SessionIssuer::new(SECRET, 7);
        assert!(issuer.resolve("not-a-jwt").is_err());
        assert!(issuer.resolve("").is_err());
    }

    #[test]
    fn test_token_lifetime_is_seven_days() {
        let issuer = SessionIssuer::new(SECRET, 7);
        let token = issuer.issue("account-a").unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<SessionClaims>(
            &token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap();
        assert_eq!(data.claims.exp - data.claims.iat, 7 * 24 * 3600);
    }
}
