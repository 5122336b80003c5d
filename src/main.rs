mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{
    adapter::AdapterRegistry, cache::ProductCache, dispatcher::Dispatcher, reaper::Reaper,
    storefront::StorefrontAdapter, tracker::JobTracker,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing price-scout server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("price_jobs_created_total", "Fetch jobs created");
    metrics::describe_counter!("price_jobs_completed_total", "Fetch jobs completed with a price");
    metrics::describe_counter!("price_jobs_failed_total", "Fetch jobs that failed");
    metrics::describe_counter!("price_jobs_reaped_total", "Active jobs timed out by the reaper");
    metrics::describe_counter!(
        "price_jobs_stale_results_total",
        "Fetch results dropped because the job was superseded"
    );
    metrics::describe_counter!("price_cache_hits_total", "Batch entries served from the product cache");
    metrics::describe_counter!("price_cache_misses_total", "Batch entries that required a job");
    metrics::describe_histogram!("price_fetch_duration_seconds", "Time spent in store fetches");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Register the built-in storefront adapters
    let mut registry = AdapterRegistry::new();
    let storefronts = StorefrontAdapter::builtin(
        &config.user_agent,
        std::time::Duration::from_secs(config.fetch_timeout_seconds),
    )
    .expect("Failed to build storefront adapters");
    for adapter in storefronts {
        registry.register(Arc::new(adapter));
    }
    let registry = Arc::new(registry);
    tracing::info!(stores = ?registry.supported_stores(), "Storefront adapters registered");

    // Wire the dedup core
    let cache = Arc::new(ProductCache::new(db_pool.clone(), config.cache_ttl()));
    let tracker = Arc::new(JobTracker::new(
        db_pool.clone(),
        Arc::clone(&cache),
        config.create_retry_max,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&tracker),
        Arc::clone(&cache),
        Arc::clone(&registry),
        config.job_timeout(),
    ));

    // Start the periodic reaper sweep
    let reaper = Reaper::new(
        db_pool.clone(),
        config.job_timeout(),
        std::time::Duration::from_secs(config.reaper_interval_seconds),
    );
    tokio::spawn(reaper.run());

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(
        db_pool,
        config,
        registry,
        tracker,
        Arc::clone(&dispatcher),
    );

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/prices", post(routes::prices::get_prices))
        .route("/api/v1/prices/status", get(routes::prices::get_status))
        .route("/api/v1/stores", get(routes::prices::supported_stores))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // batches are small

    tracing::info!("Starting price-scout on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Drain outstanding background fetches before exiting
    tracing::info!("Draining background fetch tasks");
    dispatcher.shutdown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
