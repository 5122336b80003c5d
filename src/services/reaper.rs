use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info};

use crate::db::queries;

/// Error message recorded on every reaped job.
pub const TIMEOUT_MESSAGE: &str = "request timed out";

/// Sweeps abandoned active jobs into the `timeout` state so their keys
/// become acquirable again. Bookkeeping only: an in-flight fetch is not
/// cancelled, and its late result is dropped by the tracker's staleness
/// guard.
pub struct Reaper {
    pool: PgPool,
    job_timeout: ChronoDuration,
    interval: Duration,
}

impl Reaper {
    pub fn new(pool: PgPool, job_timeout: Duration, interval: Duration) -> Self {
        Self {
            pool,
            job_timeout: ChronoDuration::seconds(job_timeout.as_secs() as i64),
            interval,
        }
    }

    /// Time out every pending/running job older than the configured
    /// timeout. Returns how many were reaped.
    pub async fn sweep(&self) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - self.job_timeout;
        let reaped = queries::reap_expired_jobs(&self.pool, cutoff, TIMEOUT_MESSAGE).await?;

        if reaped > 0 {
            info!(reaped, "timed out abandoned jobs");
            metrics::counter!("price_jobs_reaped_total").increment(reaped);
        }

        Ok(reaped)
    }

    /// Periodic sweep loop; spawned once at startup.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                error!(error = %e, "reaper sweep failed");
            }
        }
    }
}
