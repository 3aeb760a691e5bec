/// Append-only activity trail per account
use crate::error::PantryResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

/// Default icon for activity records
pub const DEFAULT_ICON: &str = "📝";

/// One entry in an account's activity trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: i64,
    #[serde(skip)]
    pub account_id: String,
    pub action: String,
    pub actor: String,
    pub icon: String,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    fn from_row(row: &SqliteRow) -> PantryResult<Self> {
        let metadata: Option<String> = row.try_get("metadata")?;
        Ok(Self {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            action: row.try_get("action")?,
            actor: row.try_get("actor")?,
            icon: row.try_get("icon")?,
            is_ai: row.try_get("is_ai")?,
            metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
            created_at: row.try_get("created_at")?,
        })
    }
}

/// A record about to be appended
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub action: String,
    pub actor: String,
    pub icon: String,
    pub is_ai: bool,
    pub metadata: Option<serde_json::Value>,
}

impl NewActivity {
    /// Activity performed by the account holder
    pub fn by_owner(action: impl Into<String>, icon: &str) -> Self {
        Self {
            action: action.into(),
            actor: "You".to_string(),
            icon: icon.to_string(),
            is_ai: false,
            metadata: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Activity log backed by the `activity` table
#[derive(Clone)]
pub struct ActivityLog {
    db: SqlitePool,
}

impl ActivityLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append a record
    pub async fn append(&self, account_id: &str, activity: NewActivity) -> PantryResult<i64> {
        let mut conn = self.db.acquire().await?;
        Self::append_with(&mut conn, account_id, activity).await
    }

    /// Append using an existing connection, e.g. inside a transaction
    pub async fn append_with(
        conn: &mut SqliteConnection,
        account_id: &str,
        activity: NewActivity,
    ) -> PantryResult<i64> {
        let metadata = activity.metadata.as_ref().map(|m| m.to_string());

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO activity (account_id, action, actor, icon, is_ai, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            "#,
        )
        .bind(account_id)
        .bind(&activity.action)
        .bind(&activity.actor)
        .bind(&activity.icon)
        .bind(activity.is_ai)
        .bind(metadata)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;

        Ok(id)
    }

    /// Append and log instead of failing; activity is never on the critical path
    pub async fn record(&self, account_id: &str, activity: NewActivity) {
        if let Err(e) = self.append(account_id, activity).await {
            tracing::warn!(account_id, "Failed to record activity: {}", e);
        }
    }

    /// Most recent records, newest first
    pub async fn recent(&self, account_id: &str, limit: i64) -> PantryResult<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, action, actor, icon, is_ai, metadata, created_at
            FROM activity
            WHERE account_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(ActivityRecord::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn test_append_and_recent() {
        let log = ActivityLog::new(db::create_memory_pool().await.unwrap());

        for i in 0..5 {
            log.append("acct", NewActivity::by_owner(format!("Action {}", i), DEFAULT_ICON))
                .await
                .unwrap();
        }
        log.append("other", NewActivity::by_owner("Elsewhere", DEFAULT_ICON))
            .await
            .unwrap();

        let recent = log.recent("acct", 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].action, "Action 4");
        assert!(recent.iter().all(|r| r.account_id == "acct"));
    }

    #[tokio::test]
    async fn test_metadata_round_trips() {
        let log = ActivityLog::new(db::create_memory_pool().await.unwrap());
        log.append(
            "acct",
            NewActivity::by_owner("Invited Bob", "📩")
                .with_actor("Alice")
                .with_metadata(serde_json::json!({ "email": "b@x.com" })),
        )
        .await
        .unwrap();

        let record = &log.recent("acct", 1).await.unwrap()[0];
        assert_eq!(record.actor, "Alice");
        assert_eq!(record.metadata.as_ref().unwrap()["email"], "b@x.com");

        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["isAI"], false);
        assert!(json.get("accountId").is_none());
    }

    #[tokio::test]
    async fn test_serializes_actor_field() {
        let log = ActivityLog::new(db::create_memory_pool().await.unwrap());
        log.append("acct", NewActivity::by_owner("Added Rice to pantry", "📥"))
            .await
            .unwrap();

        let json = serde_json::to_value(&log.recent("acct", 1).await.unwrap()[0]).unwrap();
        assert_eq!(json["actor"], "You");
        assert!(json.get("user").is_none());
    }
}
