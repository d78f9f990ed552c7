use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity for the job queue
pub const QUEUE_SIZE: usize = 100;

/// Default number of worker tasks pulling from the queue
pub const WORKER_COUNT: usize = 4;

/// Configuration for the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Number of worker tasks running de-identification jobs
    pub workers: usize,

    /// Maximum number of jobs waiting in the queue
    pub queue_size: usize,

    /// Wall-clock limit for a whole request, queueing included
    pub request_timeout_secs: u64,

    /// Largest accepted upload body
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: WORKER_COUNT,
            queue_size: QUEUE_SIZE,
            request_timeout_secs: 30,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Rejects settings the job queue cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("server.workers must be at least 1");
        }
        if self.queue_size == 0 {
            bail!("server.queue_size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ApiConfig::default().validate().is_ok());

        let no_queue = ApiConfig {
            queue_size: 0,
            ..ApiConfig::default()
        };
        assert!(no_queue.validate().is_err());

        let no_workers = ApiConfig {
            workers: 0,
            ..ApiConfig::default()
        };
        assert!(no_workers.validate().is_err());
    }
}
