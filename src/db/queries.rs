use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::job::{FetchJob, JobStatus};
use crate::models::key::StoreKey;
use crate::models::product::Product;

const JOB_COLUMNS: &str =
    "job_id, store, url, status, start_time, update_time, price_found, error_message";

const PRODUCT_COLUMNS: &str = "store, url, name, price, price_string, price_per_unit, \
     price_per_unit_string, store_id, store_address, store_zip, brand, sku, category, fetched_at";

fn job_from_row(row: &PgRow) -> Result<FetchJob, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status: JobStatus = status
        .parse()
        .map_err(|e: strum::ParseError| sqlx::Error::Decode(Box::new(e)))?;

    Ok(FetchJob {
        job_id: row.try_get("job_id")?,
        store: row.try_get("store")?,
        url: row.try_get("url")?,
        status,
        start_time: row.try_get("start_time")?,
        update_time: row.try_get("update_time")?,
        price_found: row.try_get("price_found")?,
        error_message: row.try_get("error_message")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        store: row.try_get("store")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        price_string: row.try_get("price_string")?,
        price_per_unit: row.try_get("price_per_unit")?,
        price_per_unit_string: row.try_get("price_per_unit_string")?,
        store_id: row.try_get("store_id")?,
        store_address: row.try_get("store_address")?,
        store_zip: row.try_get("store_zip")?,
        brand: row.try_get("brand")?,
        sku: row.try_get("sku")?,
        category: row.try_get("category")?,
        fetched_at: row.try_get("fetched_at")?,
    })
}

/// Try to create a pending job for the key. Returns None when another
/// active job holds the (store, url) slot; the caller re-reads and joins.
pub async fn try_create_job(
    pool: &PgPool,
    key: &StoreKey,
    job_id: &str,
) -> Result<Option<FetchJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO fetch_jobs (job_id, store, url, status, start_time, update_time, price_found)
        VALUES ($1, $2, $3, 'pending', NOW(), NOW(), FALSE)
        ON CONFLICT (store, url) WHERE status IN ('pending', 'running') DO NOTHING
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job_id)
    .bind(key.store())
    .bind(key.url())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// The active (pending or running) job for a key, if any.
pub async fn get_active_job(
    pool: &PgPool,
    key: &StoreKey,
) -> Result<Option<FetchJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM fetch_jobs
        WHERE store = $1 AND url = $2 AND status IN ('pending', 'running')
        LIMIT 1
        "#
    ))
    .bind(key.store())
    .bind(key.url())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// The most recently created job for a key, active or terminal.
pub async fn get_latest_job(
    pool: &PgPool,
    key: &StoreKey,
) -> Result<Option<FetchJob>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM fetch_jobs
        WHERE store = $1 AND url = $2
        ORDER BY start_time DESC
        LIMIT 1
        "#
    ))
    .bind(key.store())
    .bind(key.url())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// pending -> running, guarded so only the still-pending job moves.
/// Returns the number of rows updated (0 means the job was superseded).
pub async fn mark_job_running(pool: &PgPool, job_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE fetch_jobs
        SET status = 'running', update_time = NOW()
        WHERE job_id = $1 AND status = 'pending'
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Transition an active job to a terminal state. The status guard makes
/// stale completions (job already reaped or superseded) a zero-row no-op
/// instead of resurrecting the slot.
pub async fn finish_job(
    pool: &PgPool,
    job_id: &str,
    status: JobStatus,
    price_found: bool,
    error_message: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE fetch_jobs
        SET status = $2, price_found = $3, error_message = $4, update_time = NOW()
        WHERE job_id = $1 AND status IN ('pending', 'running')
        "#,
    )
    .bind(job_id)
    .bind(status.to_string())
    .bind(price_found)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Time out every active job started before the cutoff. Frees the
/// corresponding keys for new acquires.
pub async fn reap_expired_jobs(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    message: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE fetch_jobs
        SET status = 'timeout', error_message = $2, update_time = NOW()
        WHERE status IN ('pending', 'running') AND start_time < $1
        "#,
    )
    .bind(cutoff)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// The product for a key if it was fetched after the freshness cutoff.
/// Stale rows are left in place; eviction is read-time only.
pub async fn get_fresh_product(
    pool: &PgPool,
    key: &StoreKey,
    cutoff: DateTime<Utc>,
) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS}
        FROM products
        WHERE store = $1 AND url = $2 AND fetched_at > $3
        "#
    ))
    .bind(key.store())
    .bind(key.url())
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(product_from_row).transpose()
}

/// Last-write-wins upsert of the product row for its (store, url) key.
pub async fn upsert_product(pool: &PgPool, product: &Product) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO products (store, url, name, price, price_string, price_per_unit,
                              price_per_unit_string, store_id, store_address, store_zip,
                              brand, sku, category, fetched_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (store, url) DO UPDATE SET
            name = EXCLUDED.name,
            price = EXCLUDED.price,
            price_string = EXCLUDED.price_string,
            price_per_unit = EXCLUDED.price_per_unit,
            price_per_unit_string = EXCLUDED.price_per_unit_string,
            store_id = EXCLUDED.store_id,
            store_address = EXCLUDED.store_address,
            store_zip = EXCLUDED.store_zip,
            brand = EXCLUDED.brand,
            sku = EXCLUDED.sku,
            category = EXCLUDED.category,
            fetched_at = EXCLUDED.fetched_at
        "#,
    )
    .bind(&product.store)
    .bind(&product.url)
    .bind(&product.name)
    .bind(product.price)
    .bind(&product.price_string)
    .bind(product.price_per_unit)
    .bind(&product.price_per_unit_string)
    .bind(&product.store_id)
    .bind(&product.store_address)
    .bind(&product.store_zip)
    .bind(&product.brand)
    .bind(&product.sku)
    .bind(&product.category)
    .bind(product.fetched_at)
    .execute(pool)
    .await?;

    Ok(())
}
