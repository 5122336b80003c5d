use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::job::{FetchJob, JobStatus};
use crate::models::product::Product;

/// Request to fetch prices for a batch of URLs from one store.
#[derive(Debug, Deserialize, Validate)]
pub struct PriceRequest {
    #[garde(length(min = 1, max = 64))]
    pub store: String,

    #[garde(length(min = 1, max = 10), inner(length(min = 1, max = 1024)))]
    pub urls: Vec<String>,
}

impl PriceRequest {
    /// Duplicate URLs in one batch are a caller error.
    pub fn has_duplicate_urls(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.urls.iter().any(|url| !seen.insert(url.trim()))
    }
}

/// Point-in-time view of one URL's fetch, returned per batch entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: JobStatus,
    pub job_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
    pub price_found: bool,
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

impl Snapshot {
    /// Snapshot of a job's current state. `remaining_seconds` counts down
    /// toward the reap deadline and is advisory only.
    pub fn from_job(job: &FetchJob, timeout_seconds: f64, now: DateTime<Utc>) -> Self {
        let elapsed = job.elapsed_seconds(now);
        let remaining = if job.status.is_terminal() {
            0.0
        } else {
            (timeout_seconds - elapsed).max(0.0)
        };
        Self {
            status: job.status,
            job_id: Some(job.job_id.clone()),
            start_time: Some(job.start_time),
            elapsed_seconds: elapsed,
            remaining_seconds: remaining,
            price_found: job.price_found,
            error_message: job.error_message.clone(),
            product: None,
        }
    }

    /// Cache hit: a completed snapshot carrying the product, with job
    /// metadata attached when the originating job row is still around.
    pub fn cache_hit(product: Product, job: Option<&FetchJob>, now: DateTime<Utc>) -> Self {
        Self {
            status: JobStatus::Completed,
            job_id: job.map(|j| j.job_id.clone()),
            start_time: job.map(|j| j.start_time),
            elapsed_seconds: job.map(|j| j.elapsed_seconds(now)).unwrap_or(0.0),
            remaining_seconds: 0.0,
            price_found: true,
            error_message: None,
            product: Some(product),
        }
    }

    /// Rejection before any job or cache interaction, e.g. an unsupported
    /// store or a URL the adapter does not recognize.
    pub fn rejected(message: String) -> Self {
        Self {
            status: JobStatus::Failed,
            job_id: None,
            start_time: None,
            elapsed_seconds: 0.0,
            remaining_seconds: 0.0,
            price_found: false,
            error_message: Some(message),
            product: None,
        }
    }
}

/// Batch response: one snapshot per input URL, never omitting an entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub results: HashMap<String, Snapshot>,
}

/// Response for `GET /api/v1/stores`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoresResponse {
    pub supported_stores: Vec<String>,
}

/// Query parameters for the read-only status endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub store: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus, started_secs_ago: i64, now: DateTime<Utc>) -> FetchJob {
        FetchJob {
            job_id: "walmart_0_abcd1234".to_string(),
            store: "walmart".to_string(),
            url: "https://www.walmart.com/ip/1".to_string(),
            status,
            start_time: now - chrono::Duration::seconds(started_secs_ago),
            update_time: now,
            price_found: status == JobStatus::Completed,
            error_message: None,
        }
    }

    #[test]
    fn test_snapshot_counts_down_for_active_jobs() {
        let now = Utc::now();
        let snapshot = Snapshot::from_job(&job(JobStatus::Running, 120, now), 600.0, now);
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!((snapshot.elapsed_seconds - 120.0).abs() < 0.01);
        assert!((snapshot.remaining_seconds - 480.0).abs() < 0.01);
    }

    #[test]
    fn test_snapshot_remaining_never_goes_negative() {
        let now = Utc::now();
        let snapshot = Snapshot::from_job(&job(JobStatus::Running, 700, now), 600.0, now);
        assert_eq!(snapshot.remaining_seconds, 0.0);
    }

    #[test]
    fn test_snapshot_remaining_is_zero_for_terminal_jobs() {
        let now = Utc::now();
        let snapshot = Snapshot::from_job(&job(JobStatus::Completed, 30, now), 600.0, now);
        assert_eq!(snapshot.remaining_seconds, 0.0);
    }

    #[test]
    fn test_duplicate_urls_detected_after_trimming() {
        let request = PriceRequest {
            store: "walmart".to_string(),
            urls: vec![
                "https://www.walmart.com/ip/1".to_string(),
                " https://www.walmart.com/ip/1".to_string(),
            ],
        };
        assert!(request.has_duplicate_urls());
    }

    #[test]
    fn test_unique_urls_pass_duplicate_check() {
        let request = PriceRequest {
            store: "walmart".to_string(),
            urls: vec![
                "https://www.walmart.com/ip/1".to_string(),
                "https://www.walmart.com/ip/2".to_string(),
            ],
        };
        assert!(!request.has_duplicate_urls());
    }

    #[test]
    fn test_batch_size_limit_enforced() {
        let request = PriceRequest {
            store: "walmart".to_string(),
            urls: (0..11)
                .map(|i| format!("https://www.walmart.com/ip/{}", i))
                .collect(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_empty_batch_rejected() {
        let request = PriceRequest {
            store: "walmart".to_string(),
            urls: Vec::new(),
        };
        assert!(request.validate().is_err());
    }
}
