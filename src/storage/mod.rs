//! Durable, deduplicated, time-indexed persistence of normalized events.
//!
//! SQLite via sqlx. The `events` table carries a UNIQUE `(source, guid)`
//! index (the deduplication boundary) and a `pub_date` index for
//! window queries and eviction. Timestamps are stored as canonical
//! RFC 3339 UTC text so string comparison is chronological.

mod events;
mod schema;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, Event, NewEvent};
