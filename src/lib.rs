//! statuswatch aggregates incident and maintenance feeds from third-party
//! status pages into a single deduplicated, time-ordered event log, and
//! serves that log as JSON for a browser timeline view.
//!
//! The crate is organized around the ingestion pipeline:
//!
//! - [`feed`] - fetching raw feed bytes and adapting RSS/Atom dialects
//!   into a uniform item shape
//! - [`storage`] - durable, deduplicated, time-indexed event persistence
//! - [`ingest`] - the per-run orchestration across all configured sources
//! - [`server`] - the thin HTTP layer over the event store
//! - [`config`] - the feed list and runtime settings

pub mod config;
pub mod feed;
pub mod ingest;
pub mod server;
pub mod storage;
pub mod util;
