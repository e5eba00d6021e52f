use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Event-store errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The store could not be opened at all.
    #[error("failed to open event store: {0}")]
    Open(sqlx::Error),

    /// Schema creation failed. Fatal to an ingestion run.
    #[error("event store migration failed: {0}")]
    Migration(String),

    /// A stored timestamp no longer parses as RFC 3339.
    #[error("corrupt timestamp in event store: {0}")]
    CorruptTimestamp(String),

    /// Generic database error.
    #[error("database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// A normalized status event as persisted.
///
/// Content fields are immutable after first write; rows disappear only
/// through age-based eviction.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    /// Configured source name; partition key for deduplication.
    pub source: String,
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publish time, required: items without one never become events.
    pub pub_date: DateTime<Utc>,
    /// Dedup key material; unique per source.
    pub guid: String,
    /// When the event was first persisted (ingestion time, not publish
    /// time). Identical for every event of one run.
    pub created_at: DateTime<Utc>,
}

/// An event candidate produced by an ingestion run, before it has a row id.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub source: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: DateTime<Utc>,
    pub guid: String,
    pub created_at: DateTime<Utc>,
}

/// Internal row type for event queries (sqlx FromRow); converts to
/// [`Event`] via `into_event()` with timestamp parsing.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    pub id: i64,
    pub source: String,
    pub title: String,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: String,
    pub guid: Option<String>,
    pub created_at: String,
}

impl EventRow {
    pub(crate) fn into_event(self) -> Result<Event, DatabaseError> {
        Ok(Event {
            id: self.id,
            source: self.source,
            title: self.title,
            link: self.link.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            pub_date: parse_ts(&self.pub_date)?,
            guid: self.guid.unwrap_or_default(),
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

// ============================================================================
// Timestamp Encoding
// ============================================================================

/// Canonical stored form: RFC 3339 UTC, second precision, `Z` suffix.
/// Every stored timestamp and every query bound uses this exact shape so
/// lexicographic comparison in SQL matches chronological order.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DatabaseError::CorruptTimestamp(raw.to_string()))
}
