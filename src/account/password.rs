/// Password hashing with Argon2id
///
/// Hashing is CPU-bound, so the async wrappers run it on the blocking pool.
use crate::error::{PantryError, PantryResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> PantryResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PantryError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

pub async fn hash_password_async(password: String) -> PantryResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PantryError::Internal(format!("Hashing task failed: {}", e)))?
}

pub async fn verify_password_async(password: String, hash: String) -> PantryResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PantryError::Internal(format!("Verification task failed: {}", e)))
}
