use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{fmt_ts, parse_ts, DatabaseError, Event, EventRow, NewEvent};

impl Database {
    // ========================================================================
    // Event Operations
    // ========================================================================

    /// Insert one event; a duplicate `(source, guid)` is a silent no-op
    /// and the existing row keeps its original content (first write
    /// wins). Returns whether a row was actually inserted.
    pub async fn insert_event(&self, event: &NewEvent) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO events
                (source, title, link, description, pub_date, guid, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&event.source)
        .bind(&event.title)
        .bind(&event.link)
        .bind(&event.description)
        .bind(fmt_ts(event.pub_date))
        .bind(&event.guid)
        .bind(fmt_ts(event.created_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Events with `pub_date` in `[from, to)`, most recent first.
    pub async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, DatabaseError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, source, title, link, description, pub_date, guid, created_at
            FROM events
            WHERE pub_date >= ? AND pub_date < ?
            ORDER BY pub_date DESC
        "#,
        )
        .bind(fmt_ts(from))
        .bind(fmt_ts(to))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    /// The most recent `created_at` across all events, or `None` when
    /// the store is empty. Reported to callers as "last successfully
    /// updated".
    pub async fn latest_ingest_time(&self) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let row: (Option<String>,) = sqlx::query_as("SELECT MAX(created_at) FROM events")
            .fetch_one(&self.pool)
            .await?;

        match row.0 {
            Some(raw) => Ok(Some(parse_ts(&raw)?)),
            None => Ok(None),
        }
    }

    /// Delete events published before `horizon`; returns the number
    /// removed. Zero is a normal outcome, not an error.
    pub async fn evict_older_than(&self, horizon: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM events WHERE pub_date < ?")
            .bind(fmt_ts(horizon))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
