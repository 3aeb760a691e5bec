/// Account manager implementation using runtime queries
use crate::{
    account::{normalize_email, password, LoginRequest, SignupRequest},
    auth::SessionIssuer,
    db::{self, account::Account},
    error::{PantryError, PantryResult},
    mailer, metrics,
    outbox::Outbox,
};
use chrono::Utc;
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Result of a signup request
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub account: Account,
    /// False when the verification email could not be queued
    pub email_queued: bool,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    sessions: SessionIssuer,
    outbox: Arc<Outbox>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, sessions: SessionIssuer, outbox: Arc<Outbox>) -> Self {
        Self {
            db,
            sessions,
            outbox,
        }
    }

    /// Generate a uniformly random 6-digit code, leading zeros preserved
    pub fn generate_verification_code() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000u32))
    }

    /// Create an unverified account and queue its verification code.
    ///
    /// The account is committed before the email is queued; a queueing
    /// failure is logged and never undoes the signup.
    pub async fn request_signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> PantryResult<SignupOutcome> {
        let request = SignupRequest {
            name: name.trim().to_string(),
            email: normalize_email(email),
            password: password.to_string(),
        };
        request.validate()?;

        if self.email_exists(&request.email).await? {
            return Err(PantryError::DuplicateAccount);
        }

        let password_hash = password::hash_password_async(request.password).await?;
        let code = Self::generate_verification_code();
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let insert = sqlx::query(
            "INSERT INTO account (id, name, email, password_hash, is_verified, verification_code, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(&code)
        .bind(now)
        .execute(&self.db)
        .await;

        match insert {
            Ok(_) => {}
            // Lost a race with a concurrent signup for the same email
            Err(e) if db::is_unique_violation(&e) => return Err(PantryError::DuplicateAccount),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(account_id = %id, "Account created for {}", request.email);
        metrics::record_signup();

        let email_queued = match self
            .outbox
            .enqueue(&mailer::verification_code_email(&request.email, &code))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to queue verification email for {}: {}", request.email, e);
                false
            }
        };

        let account = self.get_account(&id).await?;
        Ok(SignupOutcome {
            account,
            email_queued,
        })
    }

    /// Consume a verification code, activate the account and issue a session
    pub async fn verify_email(&self, email: &str, code: &str) -> PantryResult<(Account, String)> {
        let email = normalize_email(email);
        let account = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| PantryError::NotFound("User not found".to_string()))?;

        if account.is_verified {
            return Err(PantryError::AlreadyVerified);
        }

        match account.verification_code.as_deref() {
            Some(expected) if expected == code => {}
            _ => return Err(PantryError::InvalidCode),
        }

        // Conditional on the code still being present, so it is consumed once
        let result = sqlx::query(
            "UPDATE account SET is_verified = 1, verification_code = NULL
             WHERE id = ?1 AND is_verified = 0 AND verification_code = ?2",
        )
        .bind(&account.id)
        .bind(code)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PantryError::InvalidCode);
        }

        tracing::info!(account_id = %account.id, "Email verified");

        let token = self.sessions.issue(&account.id)?;
        let account = self.get_account(&account.id).await?;
        Ok((account, token))
    }

    /// Authenticate a verified account and issue a session
    pub async fn login(&self, email: &str, password: &str) -> PantryResult<(Account, String)> {
        let request = LoginRequest {
            email: normalize_email(email),
            password: password.to_string(),
        };
        request.validate()?;

        let account = self
            .find_by_email(&request.email)
            .await?
            .ok_or(PantryError::InvalidCredentials)?;

        let valid =
            password::verify_password_async(request.password, account.password_hash.clone()).await?;
        if !valid {
            return Err(PantryError::InvalidCredentials);
        }

        if !account.is_verified {
            return Err(PantryError::UnverifiedAccount);
        }

        let token = self.sessions.issue(&account.id)?;
        tracing::debug!(account_id = %account.id, "Session issued");

        Ok((account, token))
    }

    /// Get account by id
    pub async fn get_account(&self, id: &str) -> PantryResult<Account> {
        let row = sqlx::query(&format!("SELECT {} FROM account WHERE id = ?1", Account::COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PantryError::NotFound("Account not found".to_string()))?;

        Account::from_row(&row)
    }

    /// Find account by normalized email
    pub async fn find_by_email(&self, email: &str) -> PantryResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM account WHERE email = ?1",
            Account::COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Account::from_row).transpose()
    }

    /// Check if email exists
    async fn email_exists(&self, email: &str) -> PantryResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }
}
