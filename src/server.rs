//! Thin HTTP layer over the event store and the ingestion pipeline.
//!
//! Three JSON endpoints mirror what the timeline view needs: recent
//! events, the last successful ingest time, and a manual refresh
//! trigger. No templating lives here; the browser assets are served
//! elsewhere.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::ingest::run_ingestion;
use crate::storage::{Database, DatabaseError};

/// Shared handler state. Everything here is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub client: reqwest::Client,
    pub config: Arc<Config>,
}

/// One event as served to the timeline view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiEvent {
    pub source: String,
    pub title: String,
    pub link: String,
    pub description: String,
    /// ISO 8601 UTC.
    pub pub_date: String,
    /// Display color resolved from the source's configuration.
    pub color: String,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/events", get(api_events))
        .route("/api/status", get(api_status))
        .route("/refresh", post(refresh))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Events with `pub_date` in `[now - window_hours, now)`, newest first,
/// with display colors resolved (unrecognized sources fall back to the
/// default color).
pub async fn recent_events(
    db: &Database,
    config: &Config,
    window_hours: i64,
) -> Result<Vec<ApiEvent>, DatabaseError> {
    let now = Utc::now();
    let from = now - Duration::hours(window_hours.max(1));
    let events = db.events_between(from, now).await?;

    Ok(events
        .into_iter()
        .map(|ev| ApiEvent {
            color: config.color_for(&ev.source).to_string(),
            pub_date: ev.pub_date.to_rfc3339_opts(SecondsFormat::Secs, true),
            source: ev.source,
            title: ev.title,
            link: ev.link,
            description: ev.description,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    hours: Option<i64>,
}

async fn api_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<ApiEvent>>, StatusCode> {
    let hours = query.hours.unwrap_or(state.config.window_hours);
    match recent_events(&state.db, &state.config, hours).await {
        Ok(events) => Ok(Json(events)),
        Err(e) => {
            tracing::error!(error = %e, "event query failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn api_status(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.db.latest_ingest_time().await {
        Ok(last) => Ok(Json(json!({
            "last_updated": last.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }))),
        Err(e) => {
            tracing::error!(error = %e, "status query failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Trigger one ingestion run. Responds `ok` whenever the orchestrator
/// completes. A partially failed run (some sources unreachable) is
/// still a completed run; the degradation shows up in logs and a smaller
/// event set, not in this status.
async fn refresh(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match run_ingestion(
        &state.db,
        &state.client,
        &state.config.feeds,
        state.config.retention_days,
    )
    .await
    {
        Ok(_) => Ok(Json(json!({"status": "ok"}))),
        Err(e) => {
            tracing::error!(error = %e, "ingestion run aborted");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error"})),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewEvent;
    use pretty_assertions::assert_eq;

    fn test_config() -> Config {
        Config::default()
    }

    async fn seeded_db(events: &[NewEvent]) -> Database {
        let db = Database::open(":memory:").await.unwrap();
        for event in events {
            db.insert_event(event).await.unwrap();
        }
        db
    }

    fn event(source: &str, guid: &str, hours_ago: i64) -> NewEvent {
        let ts = Utc::now() - Duration::hours(hours_ago);
        NewEvent {
            source: source.to_string(),
            title: format!("incident {guid}"),
            link: String::new(),
            description: String::new(),
            pub_date: ts,
            guid: guid.to_string(),
            created_at: ts,
        }
    }

    #[tokio::test]
    async fn recent_events_respects_the_window_and_order() {
        let db = seeded_db(&[
            event("GitHub", "old", 50),
            event("GitHub", "mid", 30),
            event("GitHub", "new", 10),
        ])
        .await;

        let events = recent_events(&db, &test_config(), 48).await.unwrap();
        let guids: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(guids, vec!["incident new", "incident mid"]);
    }

    #[tokio::test]
    async fn recent_events_resolves_colors_with_default_fallback() {
        let db = seeded_db(&[event("GitHub", "a", 1), event("Unknown", "b", 2)]).await;

        let events = recent_events(&db, &test_config(), 48).await.unwrap();
        assert_eq!(events[0].color, "#24292e");
        assert_eq!(events[1].color, crate::config::DEFAULT_COLOR);
    }
}
