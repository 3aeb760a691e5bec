/// Persistent email outbox
///
/// Requests enqueue rendered emails and return immediately. The outbox worker
/// (see [`crate::jobs`]) delivers due messages with at-least-once semantics:
/// a message is only marked delivered after the transport accepted it, failed
/// attempts are retried with exponential backoff, and a message is abandoned
/// after `max_attempts`. Once a message is delivered or abandoned its body is
/// replaced with [`REDACTED_BODY`], so invite links and codes do not outlive
/// the send.
use crate::{
    config::OutboxConfig,
    error::PantryResult,
    mailer::{EmailKind, MailTransport, OutgoingEmail},
    metrics,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Notify;

/// Base delay before the first retry
const RETRY_BASE_SECONDS: i64 = 30;
/// Upper bound on the retry delay
const RETRY_MAX_SECONDS: i64 = 3600;
/// Body kept for finished messages
pub const REDACTED_BODY: &str = "[redacted]";

/// A queued message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub id: i64,
    pub email: OutgoingEmail,
    pub attempts: i64,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        let kind: String = row.try_get("kind")?;
        Ok(Self {
            id: row.try_get("id")?,
            email: OutgoingEmail {
                kind: EmailKind::parse(&kind)?,
                to: row.try_get("recipient")?,
                subject: row.try_get("subject")?,
                body: row.try_get("body")?,
            },
            attempts: row.try_get("attempts")?,
            next_attempt_at: row.try_get("next_attempt_at")?,
            last_error: row.try_get("last_error")?,
            delivered_at: row.try_get("delivered_at")?,
            failed_at: row.try_get("failed_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Result of one delivery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: u64,
    pub retried: u64,
    pub abandoned: u64,
}

/// Email outbox backed by the `email_outbox` table
pub struct Outbox {
    db: SqlitePool,
    config: OutboxConfig,
    wakeup: Arc<Notify>,
}

impl Outbox {
    pub fn new(db: SqlitePool, config: OutboxConfig) -> Self {
        Self {
            db,
            config,
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// Queue a message for delivery and wake the worker
    pub async fn enqueue(&self, email: &OutgoingEmail) -> PantryResult<i64> {
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO email_outbox (kind, recipient, subject, body, attempts, next_attempt_at, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            RETURNING id
            "#,
        )
        .bind(email.kind.as_str())
        .bind(&email.to)
        .bind(&email.subject)
        .bind(&email.body)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        tracing::debug!(id, kind = email.kind.as_str(), "Queued email to {}", email.to);
        self.wakeup.notify_one();

        Ok(id)
    }

    /// Wait until something is enqueued
    pub async fn notified(&self) {
        self.wakeup.notified().await
    }

    /// Deliver every message whose next attempt is due
    pub async fn deliver_due(&self, transport: &dyn MailTransport) -> PantryResult<DeliveryReport> {
        let now = Utc::now();
        let rows = sqlx::query(
            r#"
            SELECT id, kind, recipient, subject, body, attempts, next_attempt_at,
                   last_error, delivered_at, failed_at, created_at
            FROM email_outbox
            WHERE delivered_at IS NULL AND failed_at IS NULL AND next_attempt_at <= ?1
            ORDER BY id
            LIMIT ?2
            "#,
        )
        .bind(now)
        .bind(self.config.batch_size)
        .fetch_all(&self.db)
        .await?;

        let mut report = DeliveryReport::default();

        for row in rows {
            let message = OutboxMessage::from_row(&row)?;
            let attempts = message.attempts + 1;

            match transport.send(&message.email).await {
                Ok(()) => {
                    sqlx::query(
                        "UPDATE email_outbox SET attempts = ?1, delivered_at = ?2, last_error = NULL, body = ?3 WHERE id = ?4",
                    )
                    .bind(attempts)
                    .bind(Utc::now())
                    .bind(REDACTED_BODY)
                    .bind(message.id)
                    .execute(&self.db)
                    .await?;

                    metrics::record_email_delivery(message.email.kind.as_str(), "delivered");
                    report.delivered += 1;
                }
                Err(e) if attempts >= self.config.max_attempts => {
                    tracing::error!(
                        id = message.id,
                        attempts,
                        "Giving up on email to {}: {}",
                        message.email.to,
                        e
                    );
                    sqlx::query(
                        "UPDATE email_outbox SET attempts = ?1, failed_at = ?2, last_error = ?3, body = ?4 WHERE id = ?5",
                    )
                    .bind(attempts)
                    .bind(Utc::now())
                    .bind(e.to_string())
                    .bind(REDACTED_BODY)
                    .bind(message.id)
                    .execute(&self.db)
                    .await?;

                    metrics::record_email_delivery(message.email.kind.as_str(), "abandoned");
                    report.abandoned += 1;
                }
                Err(e) => {
                    let next_attempt_at = Utc::now() + Self::backoff(attempts);
                    tracing::warn!(
                        id = message.id,
                        attempts,
                        %next_attempt_at,
                        "Email to {} failed, will retry: {}",
                        message.email.to,
                        e
                    );
                    sqlx::query(
                        "UPDATE email_outbox SET attempts = ?1, next_attempt_at = ?2, last_error = ?3 WHERE id = ?4",
                    )
                    .bind(attempts)
                    .bind(next_attempt_at)
                    .bind(e.to_string())
                    .bind(message.id)
                    .execute(&self.db)
                    .await?;

                    metrics::record_email_delivery(message.email.kind.as_str(), "retry");
                    report.retried += 1;
                }
            }
        }

        Ok(report)
    }

    /// Retry delay after the given number of attempts
    fn backoff(attempts: i64) -> Duration {
        let exponent = (attempts - 1).clamp(0, 16) as u32;
        let seconds = RETRY_BASE_SECONDS.saturating_mul(1_i64 << exponent);
        Duration::seconds(seconds.min(RETRY_MAX_SECONDS))
    }

    /// Delete delivered or abandoned messages older than the retention window
    pub async fn purge(&self) -> PantryResult<u64> {
        let cutoff = Utc::now() - Duration::hours(self.config.retention_hours);

        let result = sqlx::query(
            r#"
            DELETE FROM email_outbox
            WHERE (delivered_at IS NOT NULL AND delivered_at < ?1)
               OR (failed_at IS NOT NULL AND failed_at < ?1)
            "#,
        )
        .bind(cutoff)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    /// Messages addressed to a recipient, newest first.
    ///
    /// Public so router-level tests under `tests/` can read queued mail.
    pub async fn messages_for(&self, recipient: &str) -> PantryResult<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, recipient, subject, body, attempts, next_attempt_at,
                   last_error, delivered_at, failed_at, created_at
            FROM email_outbox
            WHERE recipient = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(recipient)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(OutboxMessage::from_row).collect()
    }
}
