/// Family invitation lifecycle
///
/// A member is created `pending` with a fresh invite token and becomes
/// `active` the first time that token is presented. Only the SHA-256 digest of
/// the token is stored; acceptance is a single conditional update on the
/// digest, so a token can authorize at most one transition.
use crate::{
    account::normalize_email,
    activity::{ActivityLog, NewActivity},
    db::{
        self,
        account::{FamilyMember, MemberRole, MemberStatus},
    },
    error::{PantryError, PantryResult},
    mailer, metrics,
    outbox::Outbox,
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TOKEN_SEGMENT_LENGTH: usize = 16;

/// Invite request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Family manager
pub struct FamilyManager {
    db: SqlitePool,
    outbox: Arc<Outbox>,
    activity: ActivityLog,
    public_url: String,
    frontend_url: String,
}

impl FamilyManager {
    pub fn new(
        db: SqlitePool,
        outbox: Arc<Outbox>,
        activity: ActivityLog,
        public_url: &str,
        frontend_url: &str,
    ) -> Self {
        Self {
            db,
            outbox,
            activity,
            public_url: public_url.trim_end_matches('/').to_string(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Generate an opaque invite token: two independent base-36 segments
    pub fn generate_invite_token() -> String {
        let mut rng = rand::thread_rng();
        let mut segment = || -> String {
            (0..TOKEN_SEGMENT_LENGTH)
                .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
                .collect()
        };
        let first = segment();
        let second = segment();
        format!("{}{}", first, second)
    }

    /// Digest stored in place of the token
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Link embedded in the invitation email
    pub fn invite_link(&self, token: &str) -> String {
        format!("{}/family/verify/{}", self.public_url, token)
    }

    /// Where an invitee lands after accepting
    pub fn confirmation_url(&self) -> String {
        format!("{}/login?verified=true", self.frontend_url)
    }

    /// Invite someone into the inviter's family.
    ///
    /// Email dispatch and the activity record are best effort; neither can
    /// fail the invite once the member row is written.
    pub async fn invite(
        &self,
        inviter_id: &str,
        request: InviteRequest,
    ) -> PantryResult<Vec<FamilyMember>> {
        let request = InviteRequest {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            role: request.role,
        };
        request.validate()?;

        let role = match request.role.as_deref() {
            Some(role) if !role.trim().is_empty() => MemberRole::parse(role)?,
            _ => MemberRole::default(),
        };

        let inviter_name: String = sqlx::query_scalar("SELECT name FROM account WHERE id = ?1")
            .bind(inviter_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PantryError::NotFound("User not found".to_string()))?;

        let token = Self::generate_invite_token();
        let insert = sqlx::query(
            r#"
            INSERT INTO family_member (id, account_id, name, email, role, status, invite_token_hash, added_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(inviter_id)
        .bind(&request.name)
        .bind(&request.email)
        .bind(role.as_str())
        .bind(MemberStatus::Pending.as_str())
        .bind(Self::hash_token(&token))
        .bind(Utc::now())
        .execute(&self.db)
        .await;

        match insert {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => return Err(PantryError::DuplicateMember),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(inviter_id, role = role.as_str(), "Invited {} to family", request.email);
        metrics::record_invite();

        let email = mailer::family_invite_email(&request.email, &inviter_name, &self.invite_link(&token));
        if let Err(e) = self.outbox.enqueue(&email).await {
            tracing::warn!("Failed to queue invite email for {}: {}", request.email, e);
        }

        self.activity
            .record(
                inviter_id,
                NewActivity::by_owner(format!("Invited {} to family", request.name), "📩")
                    .with_metadata(serde_json::json!({ "email": request.email })),
            )
            .await;

        self.list_members(inviter_id).await
    }

    /// Consume an invite token and activate its member.
    ///
    /// Lookup spans all inviters. Unknown and already-used tokens are
    /// indistinguishable.
    pub async fn accept_invite(&self, token: &str) -> PantryResult<FamilyMember> {
        if token.is_empty() {
            return Err(PantryError::InvalidToken);
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE family_member
            SET status = ?1, invite_token_hash = NULL, activated_at = ?2
            WHERE invite_token_hash = ?3 AND status = ?4
            RETURNING {}
            "#,
            FamilyMember::COLUMNS
        ))
        .bind(MemberStatus::Active.as_str())
        .bind(Utc::now())
        .bind(Self::hash_token(token))
        .bind(MemberStatus::Pending.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or(PantryError::InvalidToken)?;

        let member = FamilyMember::from_row(&row)?;

        tracing::info!(member_id = %member.id, account_id = %member.account_id, "Family invite accepted");
        metrics::record_invite_accepted();

        self.activity
            .record(
                &member.account_id,
                NewActivity::by_owner(format!("{} accepted the family invitation", member.name), "✅")
                    .with_actor(member.name.clone()),
            )
            .await;

        Ok(member)
    }

    /// Members of an inviter's family, oldest first
    pub async fn list_members(&self, account_id: &str) -> PantryResult<Vec<FamilyMember>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM family_member WHERE account_id = ?1 ORDER BY added_at, id",
            FamilyMember::COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(FamilyMember::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutboxConfig;

    struct Fixture {
        family: FamilyManager,
        outbox: Arc<Outbox>,
        activity: ActivityLog,
    }

    async fn create_account(db: &SqlitePool, id: &str, name: &str, email: &str) {
        sqlx::query(
            "INSERT INTO account (id, name, email, password_hash, is_verified, created_at) VALUES (?1, ?2, ?3, 'x', 1, ?4)",
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap();
    }

    async fn fixture() -> Fixture {
        let db = db::create_memory_pool().await.unwrap();
        create_account(&db, "alice", "Alice", "alice@x.com").await;
        create_account(&db, "carol", "Carol", "carol@x.com").await;

        let outbox = Arc::new(Outbox::new(
            db.clone(),
            OutboxConfig {
                poll_interval_secs: 60,
                max_attempts: 3,
                batch_size: 10,
                retention_hours: 1,
            },
        ));
        let activity = ActivityLog::new(db.clone());
        let family = FamilyManager::new(
            db,
            outbox.clone(),
            activity.clone(),
            "http://api.test/",
            "http://app.test/",
        );

        Fixture {
            family,
            outbox,
            activity,
        }
    }

    fn invite(name: &str, email: &str) -> InviteRequest {
        InviteRequest {
            name: name.to_string(),
            email: email.to_string(),
            role: None,
        }
    }

    /// Pull the token back out of the queued invitation email
    async fn token_from_outbox(outbox: &Outbox, email: &str) -> String {
        let messages = outbox.messages_for(email).await.unwrap();
        let body = &messages[0].email.body;
        let start = body.find("/family/verify/").unwrap() + "/family/verify/".len();
        body[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }

    #[test]
    fn test_token_shape() {
        let a = FamilyManager::generate_invite_token();
        let b = FamilyManager::generate_invite_token();
        assert_eq!(a.len(), 2 * TOKEN_SEGMENT_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_invite_creates_pending_member() {
        let f = fixture().await;

        let members = f.family.invite("alice", invite("Bob", " Bob@X.com ")).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].email, "bob@x.com");
        assert_eq!(members[0].role, MemberRole::Member);
        assert_eq!(members[0].status, MemberStatus::Pending);
        assert!(members[0].has_pending_invite());

        let token = token_from_outbox(&f.outbox, "bob@x.com").await;
        assert_eq!(
            members[0].invite_token_hash.as_deref(),
            Some(FamilyManager::hash_token(&token).as_str())
        );

        let activity = f.activity.recent("alice", 5).await.unwrap();
        assert_eq!(activity[0].action, "Invited Bob to family");
    }

    #[tokio::test]
    async fn test_duplicate_invite_rejected_without_new_record() {
        let f = fixture().await;
        f.family.invite("alice", invite("Bob", "bob@x.com")).await.unwrap();

        let result = f.family.invite("alice", invite("Bobby", "BOB@x.com")).await;
        assert!(matches!(result, Err(PantryError::DuplicateMember)));
        assert_eq!(f.family.list_members("alice").await.unwrap().len(), 1);
        assert_eq!(f.outbox.messages_for("bob@x.com").await.unwrap().len(), 1);

        // Another inviter may invite the same email
        f.family.invite("carol", invite("Bob", "bob@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn test_invite_token_is_single_use() {
        let f = fixture().await;
        f.family.invite("alice", invite("Bob", "bob@x.com")).await.unwrap();
        let token = token_from_outbox(&f.outbox, "bob@x.com").await;

        let member = f.family.accept_invite(&token).await.unwrap();
        assert_eq!(member.status, MemberStatus::Active);
        assert!(member.invite_token_hash.is_none());
        assert!(member.activated_at.is_some());
        assert_eq!(member.account_id, "alice");

        assert!(matches!(
            f.family.accept_invite(&token).await,
            Err(PantryError::InvalidToken)
        ));

        let activity = f.activity.recent("alice", 1).await.unwrap();
        assert_eq!(activity[0].action, "Bob accepted the family invitation");
    }

    #[tokio::test]
    async fn test_delivered_invite_leaves_no_token_in_database() {
        let f = fixture().await;
        f.family.invite("alice", invite("Bob", "bob@x.com")).await.unwrap();
        let token = token_from_outbox(&f.outbox, "bob@x.com").await;

        let mailer = crate::mailer::Mailer::new(None).unwrap();
        let report = f.outbox.deliver_due(&mailer).await.unwrap();
        assert_eq!(report.delivered, 1);

        let bodies: Vec<String> = sqlx::query_scalar("SELECT body FROM email_outbox")
            .fetch_all(&f.family.db)
            .await
            .unwrap();
        assert!(!bodies.is_empty());
        assert!(bodies.iter().all(|b| !b.contains(&token)));

        let stored: Vec<Option<String>> =
            sqlx::query_scalar("SELECT invite_token_hash FROM family_member")
                .fetch_all(&f.family.db)
                .await
                .unwrap();
        assert_eq!(stored, vec![Some(FamilyManager::hash_token(&token))]);

        // The invitee's copy of the link still works
        f.family.accept_invite(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.family.accept_invite("nope").await,
            Err(PantryError::InvalidToken)
        ));
        assert!(matches!(
            f.family.accept_invite("").await,
            Err(PantryError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_invite_validation_and_roles() {
        let f = fixture().await;

        assert!(matches!(
            f.family.invite("alice", invite("", "bob@x.com")).await,
            Err(PantryError::Validation(_))
        ));
        assert!(matches!(
            f.family.invite("alice", invite("Bob", "not-an-email")).await,
            Err(PantryError::Validation(_))
        ));

        let mut admin = invite("Dan", "dan@x.com");
        admin.role = Some("admin".to_string());
        let members = f.family.invite("alice", admin).await.unwrap();
        assert_eq!(members[0].role, MemberRole::Admin);

        let mut bogus = invite("Eve", "eve@x.com");
        bogus.role = Some("owner".to_string());
        assert!(matches!(
            f.family.invite("alice", bogus).await,
            Err(PantryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_urls_strip_trailing_slash() {
        let f = fixture().await;
        assert_eq!(f.family.invite_link("abc"), "http://api.test/family/verify/abc");
        assert_eq!(f.family.confirmation_url(), "http://app.test/login?verified=true");
    }
}
