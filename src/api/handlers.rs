use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::api::config::ApiConfig;
use crate::api::models::{ErrorResponse, HealthStatus, ProcessJob, ProcessRequest};
use crate::api::ServiceStats;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_ENQUEUE_ATTEMPTS: u32 = 3;
const ENQUEUE_RETRY_DELAY: Duration = Duration::from_millis(100);

fn error_response(status: StatusCode, request_id: &Uuid, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status)
        .insert_header((REQUEST_ID_HEADER, request_id.to_string()))
        .json(ErrorResponse::new(message))
}

/// HTTP handler for CSV uploads
///
/// Takes the raw CSV bytes from the request body, submits them to the worker
/// queue and awaits the result with a timeout. A full queue is retried a few
/// times before the request is rejected.
///
/// # Arguments
/// * `body` - Uploaded CSV, UTF-8
/// * `config` - API configuration
/// * `job_tx` - Job queue sender
///
/// # Returns
/// * HTTP response with the de-identified CSV and report, or error information
#[instrument(skip_all, fields(request_id = tracing::field::Empty, bytes = body.len()))]
pub async fn process_handler(
    body: web::Bytes,
    config: web::Data<ApiConfig>,
    job_tx: web::Data<mpsc::Sender<ProcessJob>>,
) -> impl Responder {
    let request_id = Uuid::new_v4();
    tracing::Span::current().record("request_id", tracing::field::display(&request_id));
    info!("Received upload of {} bytes", body.len());

    if body.is_empty() {
        warn!("Rejected empty upload");
        return error_response(StatusCode::BAD_REQUEST, &request_id, "No file content in the request");
    }

    let mut attempts = 0;
    let mut pending = Some(body);

    while let Some(body) = pending.take() {
        let (response_tx, response_rx) = oneshot::channel();
        let job = ProcessJob {
            request: ProcessRequest { request_id, body },
            response_tx,
        };

        match job_tx.try_send(job) {
            Ok(()) => {
                debug!("Job enqueued after {} attempt(s)", attempts + 1);
                debug!("Waiting for result with timeout: {:?}", config.request_timeout());
                return match timeout(config.request_timeout(), response_rx).await {
                    Ok(Ok(Ok(response))) => {
                        info!("Upload processed successfully");
                        HttpResponse::Ok()
                            .insert_header((REQUEST_ID_HEADER, request_id.to_string()))
                            .json(response)
                    }
                    Ok(Ok(Err(e))) if e.is_input_error() => {
                        warn!("Rejected upload: {}", e);
                        error_response(StatusCode::BAD_REQUEST, &request_id, e.to_string())
                    }
                    Ok(Ok(Err(e))) => {
                        error!("De-identification failed: {}", e);
                        error_response(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            &request_id,
                            format!("An error occurred during processing: {}", e),
                        )
                    }
                    Ok(Err(_)) => {
                        error!("Worker channel closed unexpectedly");
                        error_response(StatusCode::INTERNAL_SERVER_ERROR, &request_id, "Worker dropped.")
                    }
                    Err(_) => {
                        error!("Request timed out after {:?}", config.request_timeout());
                        error_response(StatusCode::REQUEST_TIMEOUT, &request_id, "Request timed out.")
                    }
                };
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                attempts += 1;
                if attempts < MAX_ENQUEUE_ATTEMPTS {
                    warn!("Queue full, retrying (attempt {}/{})", attempts, MAX_ENQUEUE_ATTEMPTS);
                    sleep(ENQUEUE_RETRY_DELAY).await;
                    pending = Some(job.request.body);
                } else {
                    warn!("Queue full after {} attempts, rejecting request", MAX_ENQUEUE_ATTEMPTS);
                    return error_response(
                        StatusCode::TOO_MANY_REQUESTS,
                        &request_id,
                        "Server is busy, try again later.",
                    );
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!("Worker queue has been closed!");
                return error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &request_id,
                    "Service is shutting down or unavailable.",
                );
            }
        }
    }

    error!("Unexpected code path in process_handler");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &request_id,
        "Internal error in request handling.",
    )
}

/// Health check endpoint for monitoring service status
///
/// Reports queue usage and job counters.
#[instrument(skip_all)]
pub async fn health_check(
    config: web::Data<ApiConfig>,
    job_tx: web::Data<mpsc::Sender<ProcessJob>>,
    stats: web::Data<Arc<ServiceStats>>,
) -> impl Responder {
    debug!("Processing health check request");

    let capacity = job_tx.max_capacity();
    let free_slots = job_tx.capacity();
    let queued = capacity.saturating_sub(free_slots);

    let status = if job_tx.is_closed() {
        warn!("Health check: job queue is closed");
        "unhealthy"
    } else if free_slots == 0 {
        "degraded"
    } else {
        "healthy"
    };

    info!("Health check: status={}, queued={}/{}", status, queued, capacity);
    HttpResponse::Ok().json(HealthStatus {
        status: status.to_string(),
        workers: config.workers,
        queue_capacity: capacity,
        queued_jobs: queued,
        processed_jobs: stats.processed.load(Ordering::Relaxed),
        failed_jobs: stats.failed.load(Ordering::Relaxed),
        uptime_secs: stats.uptime().as_secs(),
    })
}
