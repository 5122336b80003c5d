//! Batch retail price lookups with deduplicated background fetches.
//!
//! Concurrent requests for the same (store, url) key share a single
//! in-flight fetch job, recent results are served from a TTL-bounded
//! product cache, and abandoned jobs are reaped after a timeout so
//! their keys become available again.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
