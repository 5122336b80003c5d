use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::models::key::StoreKey;
use crate::models::pricing::Snapshot;
use crate::services::adapter::{AdapterRegistry, StoreAdapter};
use crate::services::cache::ProductCache;
use crate::services::tracker::JobTracker;

/// Batch entry point: serves cache hits, acquires or joins jobs, and
/// launches background fetches for newly created jobs.
///
/// Background fetch handles are kept in a `JoinSet` so shutdown can
/// drain them instead of leaving orphaned work behind.
pub struct Dispatcher {
    tracker: Arc<JobTracker>,
    cache: Arc<ProductCache>,
    registry: Arc<AdapterRegistry>,
    timeout_seconds: f64,
    tasks: Mutex<JoinSet<()>>,
}

impl Dispatcher {
    pub fn new(
        tracker: Arc<JobTracker>,
        cache: Arc<ProductCache>,
        registry: Arc<AdapterRegistry>,
        job_timeout: Duration,
    ) -> Self {
        Self {
            tracker,
            cache,
            registry,
            timeout_seconds: job_timeout.as_secs_f64(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Dispatch a batch. Every URL is handled concurrently and
    /// independently; the returned map always carries one snapshot per
    /// input URL, and no entry waits for a fetch to finish.
    pub async fn dispatch(&self, store: &str, urls: &[String]) -> HashMap<String, Snapshot> {
        let snapshots =
            futures::future::join_all(urls.iter().map(|url| self.dispatch_one(store, url))).await;

        urls.iter().cloned().zip(snapshots).collect()
    }

    async fn dispatch_one(&self, store: &str, url: &str) -> Snapshot {
        let key = StoreKey::new(store, url);

        // Reject unrecognizable keys before touching job or cache state.
        let Some(adapter) = self.registry.get(key.store()) else {
            return Snapshot::rejected(format!("unsupported store: {}", key.store()));
        };
        if !adapter.matches_url(key.url()) {
            return Snapshot::rejected(format!(
                "url is not a recognized {} product page",
                key.store()
            ));
        }

        match self.cache.get_fresh(&key).await {
            Ok(Some(product)) => {
                metrics::counter!("price_cache_hits_total").increment(1);
                let job = match self.tracker.get_status(&key).await {
                    Ok(job) => job,
                    Err(e) => {
                        warn!(key = %key, error = %e, "status lookup failed on cache hit");
                        None
                    }
                };
                return Snapshot::cache_hit(product, job.as_ref(), Utc::now());
            }
            Ok(None) => {
                metrics::counter!("price_cache_misses_total").increment(1);
            }
            Err(e) => {
                error!(key = %key, error = %e, "cache lookup failed");
                return Snapshot::rejected(format!("cache lookup failed: {}", e));
            }
        }

        match self.tracker.acquire_or_join(&key).await {
            Ok((job, is_new)) => {
                if is_new {
                    info!(key = %key, job_id = %job.job_id, "starting background fetch");
                    self.spawn_fetch(adapter, key, job.job_id.clone()).await;
                }
                Snapshot::from_job(&job, self.timeout_seconds, Utc::now())
            }
            Err(e) => {
                error!(key = %key, error = %e, "failed to acquire job");
                Snapshot::rejected(format!("failed to acquire job: {}", e))
            }
        }
    }

    async fn spawn_fetch(&self, adapter: Arc<dyn StoreAdapter>, key: StoreKey, job_id: String) {
        let tracker = Arc::clone(&self.tracker);
        let mut tasks = self.tasks.lock().await;

        // Reap finished handles so the set stays bounded.
        while tasks.try_join_next().is_some() {}

        tasks.spawn(run_fetch(tracker, adapter, key, job_id));
    }

    /// Await every outstanding background fetch. Called once on shutdown.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        while tasks.join_next().await.is_some() {}
    }
}

async fn run_fetch(
    tracker: Arc<JobTracker>,
    adapter: Arc<dyn StoreAdapter>,
    key: StoreKey,
    job_id: String,
) {
    match tracker.mark_running(&key, &job_id).await {
        Ok(true) => {}
        // Superseded before the fetch began; nothing to do.
        Ok(false) => return,
        Err(e) => {
            error!(key = %key, job_id = %job_id, error = %e, "could not mark job running");
            return;
        }
    }

    let start = std::time::Instant::now();
    let outcome = adapter.fetch(key.url()).await;
    metrics::histogram!("price_fetch_duration_seconds").record(start.elapsed().as_secs_f64());

    let recorded = match outcome {
        Ok(info) => {
            info!(key = %key, job_id = %job_id, product = %info.name, "price fetch completed");
            tracker.complete(&key, &job_id, info).await
        }
        Err(e) => {
            warn!(key = %key, job_id = %job_id, error = %e, "price fetch failed");
            tracker.fail(&key, &job_id, &e.to_string()).await
        }
    };

    if let Err(e) = recorded {
        error!(key = %key, job_id = %job_id, error = %e, "could not record fetch outcome");
    }
}
