use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

// ============================================================================
// Database
// ============================================================================

/// Handle to the event store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open the event store and ensure its schema exists.
    ///
    /// `path` may be `:memory:` for tests.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::Open`] when the pool cannot be created,
    /// [`DatabaseError::Migration`] when the schema cannot be ensured.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        // busy_timeout: wait for a writer to release its lock instead of
        // surfacing SQLITE_BUSY to concurrent API reads mid-ingestion.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::Open)?
            .pragma("busy_timeout", "5000");

        // A :memory: database exists per connection; a larger pool would
        // hand out independent empty stores.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::Open)?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Idempotently ensure the events table and its indexes exist.
    ///
    /// Safe to call on every process start and before every ingestion
    /// run; all statements use `IF NOT EXISTS` and run in one
    /// transaction so a failed migration leaves the previous state
    /// intact.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::Migration`], the one fatal condition of an
    /// ingestion run.
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        self.migrate()
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT,
                description TEXT,
                pub_date TEXT NOT NULL, -- ISO 8601 in UTC
                guid TEXT,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Deduplication boundary: at most one event per (source, guid).
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_events_source_guid
            ON events(source, guid)
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Window queries and eviction both scan by pub_date.
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_pub_date ON events(pub_date DESC)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
