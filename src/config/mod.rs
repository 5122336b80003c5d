use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// How long a cached product is served without re-fetching
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,

    /// How long a job may stay active before the reaper times it out
    #[serde(default = "default_job_timeout_minutes")]
    pub job_timeout_minutes: u64,

    /// Retries after a create conflict where the racing job vanished
    #[serde(default = "default_create_retry_max")]
    pub create_retry_max: u32,

    /// How often the reaper sweeps for abandoned jobs
    #[serde(default = "default_reaper_interval_seconds")]
    pub reaper_interval_seconds: u64,

    /// Timeout for a single outbound store page fetch
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,

    /// User agent presented to store sites
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_cache_ttl_hours() -> u64 {
    24
}

fn default_job_timeout_minutes() -> u64 {
    10
}

fn default_create_retry_max() -> u32 {
    1
}

fn default_reaper_interval_seconds() -> u64 {
    60
}

fn default_fetch_timeout_seconds() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; PriceScoutBot/1.0)".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cache_ttl_hours * 3600)
    }

    pub fn job_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.job_timeout_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_cache_ttl_hours(), 24);
        assert_eq!(default_job_timeout_minutes(), 10);
        assert_eq!(default_create_retry_max(), 1);
    }

    #[test]
    fn test_duration_conversions() {
        let config = AppConfig {
            bind_addr: default_bind_addr(),
            database_url: "postgres://localhost/price_scout".to_string(),
            cache_ttl_hours: 24,
            job_timeout_minutes: 10,
            create_retry_max: 1,
            reaper_interval_seconds: 60,
            fetch_timeout_seconds: 30,
            user_agent: default_user_agent(),
        };
        assert_eq!(config.cache_ttl().as_secs(), 86_400);
        assert_eq!(config.job_timeout().as_secs(), 600);
    }
}
