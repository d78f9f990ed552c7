use actix_web::web::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::pipeline::{EntityCounts, PipelineError};

/// One uploaded CSV waiting to be de-identified
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Correlates log lines and the response header
    pub request_id: Uuid,

    /// Raw upload body, decoded by the pipeline
    pub body: Bytes,
}

/// Internal job structure for the worker queue
#[derive(Debug)]
pub struct ProcessJob {
    /// The upload to process
    pub request: ProcessRequest,

    /// Sender for the response channel
    pub response_tx: oneshot::Sender<Result<ProcessResponse, PipelineError>>,
}

/// Successful de-identification result
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProcessResponse {
    /// Identifier of the request that produced this result
    pub request_id: String,

    /// The uploaded CSV with detected PII masked
    pub deidentified_csv: String,

    /// Human-readable summary of what was found
    pub report: String,

    /// Occurrences per entity type
    pub entity_counts: EntityCounts,
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: healthy, degraded, or unhealthy
    pub status: String,

    /// Number of worker tasks
    pub workers: usize,

    /// Maximum number of queued jobs
    pub queue_capacity: usize,

    /// Jobs currently waiting in the queue
    pub queued_jobs: usize,

    /// Jobs completed successfully since startup
    pub processed_jobs: usize,

    /// Jobs that ended in an error since startup
    pub failed_jobs: usize,

    /// Seconds since the service started
    pub uptime_secs: u64,
}

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status indicator: error
    pub status: String,

    /// Error message details
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
