use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use statuswatch::config::Config;
use statuswatch::ingest::run_ingestion;
use statuswatch::server::{self, AppState};
use statuswatch::storage::Database;

#[derive(Parser, Debug)]
#[command(
    name = "statuswatch",
    about = "Aggregates status-page incident feeds into a deduplicated timeline"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "FILE", default_value = "statuswatch.toml")]
    config: PathBuf,

    /// Override the database path from the config file
    #[arg(long, value_name = "FILE")]
    db: Option<String>,

    /// Run one ingestion pass and exit (for cron-style scheduling)
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(db_path) = args.db {
        config.db_path = db_path;
    }

    let db = Database::open(&config.db_path)
        .await
        .context("Failed to open event store")?;
    let client = reqwest::Client::new();

    if args.once {
        let summary = run_ingestion(&db, &client, &config.feeds, config.retention_days)
            .await
            .context("Ingestion run failed")?;
        println!(
            "Ingested {} new events from {} sources ({} failed)",
            summary.events_inserted, summary.sources_ok, summary.sources_failed
        );
        return Ok(());
    }

    let config = Arc::new(config);

    // Optional in-process scheduler; 0 = manual refresh only.
    if config.refresh_interval_minutes > 0 {
        let db = db.clone();
        let client = client.clone();
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let period = Duration::from_secs(config.refresh_interval_minutes * 60);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // The first tick completes immediately, giving a warm
                // store before the first page load.
                ticker.tick().await;
                if let Err(e) =
                    run_ingestion(&db, &client, &config.feeds, config.retention_days).await
                {
                    tracing::error!(error = %e, "scheduled ingestion run aborted");
                }
            }
        });
    }

    let state = AppState {
        db,
        client,
        config: Arc::clone(&config),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        feeds = config.feeds.len(),
        "statuswatch listening"
    );

    axum::serve(listener, server::create_router(state)).await?;

    Ok(())
}
