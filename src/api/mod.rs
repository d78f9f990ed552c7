pub mod config;
pub mod handlers;
pub mod models;
pub mod processor;
pub mod workers;

use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::api::config::ApiConfig;
use crate::api::handlers::{health_check, process_handler};
use crate::api::models::ProcessJob;
use crate::api::workers::start_workers;
use crate::pipeline::Deidentifier;

/// Job counters shared between the workers and /health
#[derive(Debug)]
pub struct ServiceStats {
    pub processed: AtomicUsize,
    pub failed: AtomicUsize,
    started: Instant,
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Registers the API endpoints
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/process").route(web::post().to(process_handler)))
        .service(web::resource("/health").route(web::get().to(health_check)));
}

/// Creates the bounded job queue and spawns its workers
///
/// Must be called from within a Tokio runtime.
pub fn spawn_job_queue(
    config: &ApiConfig,
    deidentifier: Deidentifier,
    stats: Arc<ServiceStats>,
) -> mpsc::Sender<ProcessJob> {
    debug!("Creating job queue with capacity: {}", config.queue_size);
    let (job_tx, job_rx) = mpsc::channel::<ProcessJob>(config.queue_size.max(1));
    start_workers(job_rx, config.workers, deidentifier, stats);
    job_tx
}

/// Starts the API server with the specified configuration
///
/// Sets up the job queue and workers around the shared pipeline, then serves
/// the HTTP endpoints until shutdown.
///
/// # Arguments
/// * `config` - Server settings
/// * `deidentifier` - Pipeline built once at startup and shared by every job
///
/// # Returns
/// * `Result<()>` - Success or an error
#[instrument(skip_all, fields(host = %config.host, port = config.port))]
pub async fn start_server(config: ApiConfig, deidentifier: Deidentifier) -> Result<()> {
    info!("Starting de-identification API server on {}:{}", config.host, config.port);

    let stats = Arc::new(ServiceStats::new());
    let job_tx = spawn_job_queue(&config, deidentifier, stats.clone());

    let config_data = web::Data::new(config.clone());
    let job_tx_data = web::Data::new(job_tx);
    let stats_data = web::Data::new(stats);
    let max_upload_bytes = config.max_upload_bytes;

    info!("Starting HTTP server at {}:{}", config.host, config.port);
    let server_result = HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(job_tx_data.clone())
            .app_data(stats_data.clone())
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))
    .map_err(|e| {
        error!("Failed to bind to {}:{}: {}", config.host, config.port, e);
        e
    })?
    .run()
    .await;

    if let Err(e) = server_result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
