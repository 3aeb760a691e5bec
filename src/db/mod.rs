/// Database layer for PantryIQ
///
/// Manages the SQLite connection pool and embedded migrations. The row
/// models for accounts and family members live in [`account`].

pub mod account;

use crate::error::{PantryError, PantryResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> PantryResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections.max(1))
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    SqliteJournalMode::Wal
                } else {
                    SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    Ok(pool)
}

/// Create a migrated in-memory pool.
///
/// Every SQLite in-memory connection is a separate database, so the pool is
/// pinned to a single connection.
pub async fn create_memory_pool() -> PantryResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Run migrations embedded at compile time from ./migrations
pub async fn run_migrations(pool: &SqlitePool) -> PantryResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| PantryError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> PantryResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// True when the error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_is_migrated() {
        let pool = create_memory_pool().await.unwrap();
        test_connection(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('account', 'family_member', 'email_outbox')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pantry.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        assert!(path.exists());
    }
}
