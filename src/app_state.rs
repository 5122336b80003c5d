use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{adapter::AdapterRegistry, dispatcher::Dispatcher, tracker::JobTracker};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub registry: Arc<AdapterRegistry>,
    pub tracker: Arc<JobTracker>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: AppConfig,
        registry: Arc<AdapterRegistry>,
        tracker: Arc<JobTracker>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            registry,
            tracker,
            dispatcher,
        }
    }
}
