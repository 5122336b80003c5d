use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::key::StoreKey;

/// Lifecycle status of a fetch job.
///
/// `pending -> running -> completed | failed`, with `timeout` reachable
/// from either active state via the reaper. Terminal states free the
/// (store, url) slot for a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// One tracked fetch attempt for a (store, url) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchJob {
    pub job_id: String,
    pub store: String,
    pub url: String,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub price_found: bool,
    pub error_message: Option<String>,
}

impl FetchJob {
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        (now - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

/// Build a job id that stays unique under concurrent creation for the
/// same key: store, creation second, and a random suffix.
pub fn generate_job_id(key: &StoreKey, now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", key.store(), now.timestamp(), &suffix[..8])
}
