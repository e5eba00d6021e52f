//! One ingestion run: fetch every configured source, adapt its feed into
//! normalized events, persist idempotently, then retire stale rows.
//!
//! Failure is graded. A source that cannot be fetched or parsed is
//! logged and contributes nothing this run; an item that cannot be
//! stored is logged and its batch continues. The only fatal condition is
//! the store schema failing to materialize.

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};

use crate::config::FeedSource;
use crate::feed::{fetch_source, parse_feed};
use crate::storage::{Database, DatabaseError, NewEvent};

/// Sources fetched at once. Fetches dominate run latency and are
/// independent, so a small pool captures most of the win without
/// hammering anyone.
const FETCH_CONCURRENCY: usize = 4;

/// Counts from one ingestion run, for logs and tests. The HTTP layer
/// reports only "the run completed" and discards these.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub items_parsed: usize,
    /// Items discarded for lacking a parseable publish date.
    pub items_dropped: usize,
    /// Events actually written; duplicates from earlier runs are not
    /// counted.
    pub events_inserted: usize,
    pub events_evicted: u64,
}

#[derive(Debug, Default)]
struct SourceOutcome {
    parsed: usize,
    dropped: usize,
    inserted: usize,
    failed: bool,
}

/// Perform one full ingestion run over `sources`.
///
/// The run timestamp is captured once and used as `created_at` for every
/// event persisted, so all events of one run share an identical
/// ingestion time. After all sources are processed, events published
/// before `now - retention_days` are evicted.
///
/// Re-running against unchanged upstreams is safe and changes nothing:
/// inserts are keyed by `(source, guid)` and first-write-wins.
///
/// # Errors
///
/// Only [`DatabaseError`] from ensuring the store schema; per-source
/// and per-item failures are logged and absorbed.
pub async fn run_ingestion(
    db: &Database,
    client: &reqwest::Client,
    sources: &[FeedSource],
    retention_days: i64,
) -> Result<IngestSummary, DatabaseError> {
    db.ensure_schema().await?;

    let now = Utc::now();

    let mut source_futures = Vec::with_capacity(sources.len());
    for source in sources {
        source_futures.push(ingest_source(db, client, source, now));
    }
    let outcomes: Vec<SourceOutcome> = stream::iter(source_futures)
        .buffer_unordered(FETCH_CONCURRENCY)
        .collect()
        .await;

    let mut summary = IngestSummary::default();
    for outcome in outcomes {
        if outcome.failed {
            summary.sources_failed += 1;
        } else {
            summary.sources_ok += 1;
        }
        summary.items_parsed += outcome.parsed;
        summary.items_dropped += outcome.dropped;
        summary.events_inserted += outcome.inserted;
    }

    let horizon = now - Duration::days(retention_days);
    match db.evict_older_than(horizon).await {
        Ok(removed) => {
            summary.events_evicted = removed;
            if removed > 0 {
                tracing::info!(removed = removed, "evicted events past the retention horizon");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "eviction failed; stale events remain until the next run");
        }
    }

    tracing::info!(
        sources_ok = summary.sources_ok,
        sources_failed = summary.sources_failed,
        items = summary.items_parsed,
        dropped = summary.items_dropped,
        inserted = summary.events_inserted,
        evicted = summary.events_evicted,
        "ingestion run complete"
    );

    Ok(summary)
}

/// Process one source end to end. Never propagates an error: fetch and
/// parse failures mark the source failed, insert failures are absorbed
/// per item.
async fn ingest_source(
    db: &Database,
    client: &reqwest::Client,
    source: &FeedSource,
    created_at: DateTime<Utc>,
) -> SourceOutcome {
    let bytes = match fetch_source(client, &source.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(source = %source.name, error = %e, "fetch failed, skipping source");
            return SourceOutcome {
                failed: true,
                ..SourceOutcome::default()
            };
        }
    };

    let parsed = match parse_feed(&bytes, &source.name) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(source = %source.name, error = %e, "parse failed, skipping source");
            return SourceOutcome {
                failed: true,
                ..SourceOutcome::default()
            };
        }
    };

    let mut inserted = 0usize;
    for item in &parsed.items {
        let event = NewEvent {
            source: source.name.clone(),
            title: item.title.clone(),
            link: item.link.clone(),
            description: item.description.clone(),
            pub_date: item.pub_date,
            guid: item.guid.clone(),
            created_at,
        };
        match db.insert_event(&event).await {
            Ok(true) => inserted += 1,
            // Already stored by an earlier run; first write wins.
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    source = %source.name,
                    guid = %item.guid,
                    error = %e,
                    "insert failed, continuing with remaining items"
                );
            }
        }
    }

    SourceOutcome {
        parsed: parsed.items.len(),
        dropped: parsed.dropped_dates,
        inserted,
        failed: false,
    }
}
