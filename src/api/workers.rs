use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use crate::api::models::ProcessJob;
use crate::api::processor::process_request;
use crate::api::ServiceStats;
use crate::pipeline::Deidentifier;

/// Starts worker tasks to process jobs from the queue
///
/// Each worker pulls jobs from the shared queue and runs them through the
/// shared pipeline. Workers exit once every sender is dropped.
///
/// # Arguments
/// * `job_rx` - Job receiver channel, shared between the workers
/// * `workers` - Number of worker tasks to spawn
/// * `deidentifier` - Pipeline built once at startup
/// * `stats` - Job counters reported by /health
pub fn start_workers(
    job_rx: mpsc::Receiver<ProcessJob>,
    workers: usize,
    deidentifier: Deidentifier,
    stats: Arc<ServiceStats>,
) {
    // Wrap the job receiver in a mutex so multiple workers can access it
    let job_rx = Arc::new(Mutex::new(job_rx));

    info!("Spawning {} worker tasks", workers);

    for worker_id in 0..workers.max(1) {
        let deidentifier = deidentifier.clone();
        let job_rx = job_rx.clone();
        let stats = stats.clone();

        tokio::spawn(async move {
            debug!("Worker {} started", worker_id);
            loop {
                trace!("Worker {} waiting for job", worker_id);
                let job_opt = { job_rx.lock().await.recv().await };

                match job_opt {
                    Some(job) => {
                        debug!("Worker {} processing request {}", worker_id, job.request.request_id);
                        let result = process_request(job.request, deidentifier.clone()).await;

                        match &result {
                            Ok(_) => {
                                stats.processed.fetch_add(1, Ordering::Relaxed);
                                debug!("Worker {} completed job successfully", worker_id);
                            }
                            Err(e) => {
                                stats.failed.fetch_add(1, Ordering::Relaxed);
                                warn!("Worker {} job failed: {}", worker_id, e);
                            }
                        }

                        if job.response_tx.send(result).is_err() {
                            warn!("Worker {} failed to send response - receiver dropped", worker_id);
                        }
                    }
                    None => {
                        info!("Worker {} shutting down - channel closed", worker_id);
                        break;
                    }
                }
            }
        });
    }
}
