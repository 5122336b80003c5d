use chrono::{Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::warn;

use crate::db::queries;
use crate::models::key::StoreKey;
use crate::models::product::Product;

/// Attempts per upsert before giving up and reporting the error.
const PUT_ATTEMPTS: u32 = 3;

/// Freshness-windowed store of the last good result per (store, url).
pub struct ProductCache {
    pool: PgPool,
    ttl: ChronoDuration,
}

impl ProductCache {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl: ChronoDuration::seconds(ttl.as_secs() as i64),
        }
    }

    /// The cached product, only while younger than the TTL. Stale rows
    /// are not deleted here; the next successful fetch overwrites them.
    pub async fn get_fresh(&self, key: &StoreKey) -> Result<Option<Product>, sqlx::Error> {
        let cutoff = Utc::now() - self.ttl;
        queries::get_fresh_product(&self.pool, key, cutoff).await
    }

    /// Upsert, unconditionally overwriting any prior row for the key.
    /// Transient write failures are retried a few times.
    pub async fn put(&self, product: &Product) -> Result<(), sqlx::Error> {
        let mut last_error = None;
        for attempt in 1..=PUT_ATTEMPTS {
            match queries::upsert_product(&self.pool, product).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        store = %product.store,
                        url = %product.url,
                        attempt,
                        error = %e,
                        "product upsert failed"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(sqlx::Error::PoolClosed))
    }
}
