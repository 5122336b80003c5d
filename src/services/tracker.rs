use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use crate::db::queries;
use crate::models::job::{generate_job_id, FetchJob, JobStatus};
use crate::models::key::StoreKey;
use crate::models::product::{Product, ProductInfo};
use crate::services::cache::ProductCache;

/// Attempts per terminal-transition write before giving up.
const FINISH_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("gave up creating a job for {0}: every attempt conflicted with a job that went terminal before it could be joined")]
    CreateConflict(String),
}

/// The dedup core. At most one active job exists per (store, url); the
/// partial unique index on the job table is the authority, and every
/// mutation here goes through a guarded compare-and-update.
pub struct JobTracker {
    pool: PgPool,
    cache: Arc<ProductCache>,
    create_retry_max: u32,
}

impl JobTracker {
    pub fn new(pool: PgPool, cache: Arc<ProductCache>, create_retry_max: u32) -> Self {
        Self {
            pool,
            cache,
            create_retry_max,
        }
    }

    /// Create a pending job for the key, or join the active one.
    ///
    /// The insert races against concurrent callers; losers re-read the
    /// winner's job. If the winner went terminal in the window between
    /// insert and re-read, the insert is retried a bounded number of
    /// times. Returns the job and whether this call created it.
    pub async fn acquire_or_join(&self, key: &StoreKey) -> Result<(FetchJob, bool), TrackerError> {
        for _ in 0..=self.create_retry_max {
            let job_id = generate_job_id(key, Utc::now());
            if let Some(job) = queries::try_create_job(&self.pool, key, &job_id).await? {
                metrics::counter!("price_jobs_created_total").increment(1);
                return Ok((job, true));
            }

            if let Some(job) = queries::get_active_job(&self.pool, key).await? {
                return Ok((job, false));
            }
        }

        Err(TrackerError::CreateConflict(key.to_string()))
    }

    /// pending -> running, immediately before the adapter call. Returns
    /// false when the job was superseded and the fetch should not start.
    pub async fn mark_running(&self, key: &StoreKey, job_id: &str) -> Result<bool, TrackerError> {
        let updated = queries::mark_job_running(&self.pool, job_id).await?;
        if updated == 0 {
            warn!(key = %key, job_id, "job superseded before fetch started");
        }
        Ok(updated > 0)
    }

    /// running -> completed, then publish the product to the cache.
    ///
    /// The guarded update makes a late completion for a reaped or
    /// superseded job a no-op: the result is dropped and the newer job's
    /// state is left untouched.
    pub async fn complete(
        &self,
        key: &StoreKey,
        job_id: &str,
        info: ProductInfo,
    ) -> Result<(), TrackerError> {
        let updated = self
            .finish_with_retries(job_id, JobStatus::Completed, true, None)
            .await?;
        if updated == 0 {
            warn!(key = %key, job_id, "stale completion dropped");
            metrics::counter!("price_jobs_stale_results_total").increment(1);
            return Ok(());
        }

        metrics::counter!("price_jobs_completed_total").increment(1);

        let product = Product::from_info(key, info, Utc::now());
        if let Err(e) = self.cache.put(&product).await {
            // The fetch succeeded; losing the cache write only costs a
            // re-fetch once this job ages out.
            error!(key = %key, job_id, error = %e, "product not cached after successful fetch");
        }

        Ok(())
    }

    /// running -> failed, recording the adapter's error. Same staleness
    /// guard as `complete`.
    pub async fn fail(
        &self,
        key: &StoreKey,
        job_id: &str,
        error_message: &str,
    ) -> Result<(), TrackerError> {
        let updated = self
            .finish_with_retries(job_id, JobStatus::Failed, false, Some(error_message))
            .await?;
        if updated == 0 {
            warn!(key = %key, job_id, "stale failure dropped");
            metrics::counter!("price_jobs_stale_results_total").increment(1);
            return Ok(());
        }

        metrics::counter!("price_jobs_failed_total").increment(1);
        Ok(())
    }

    /// Latest job for the key, active or terminal. Read-only.
    pub async fn get_status(&self, key: &StoreKey) -> Result<Option<FetchJob>, TrackerError> {
        Ok(queries::get_latest_job(&self.pool, key).await?)
    }

    async fn finish_with_retries(
        &self,
        job_id: &str,
        status: JobStatus,
        price_found: bool,
        error_message: Option<&str>,
    ) -> Result<u64, TrackerError> {
        let mut last_error = None;
        for attempt in 1..=FINISH_ATTEMPTS {
            match queries::finish_job(&self.pool, job_id, status, price_found, error_message).await
            {
                Ok(updated) => return Ok(updated),
                Err(e) => {
                    warn!(job_id, attempt, error = %e, "job finish write failed");
                    last_error = Some(e);
                }
            }
        }
        Err(TrackerError::Database(
            last_error.unwrap_or(sqlx::Error::PoolClosed),
        ))
    }
}
