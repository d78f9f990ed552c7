use tracing::{debug, instrument};

use crate::api::models::{ProcessRequest, ProcessResponse};
use crate::pipeline::{Deidentifier, PipelineError};

/// Runs one de-identification job
///
/// The pipeline is synchronous and CPU bound, so it runs on the blocking
/// thread pool. The whole upload either comes back fully masked or as an
/// error; there is no partial result.
///
/// # Arguments
/// * `request` - The upload to process
/// * `deidentifier` - Shared pipeline built at startup
///
/// # Returns
/// * `Result<ProcessResponse, PipelineError>` - Masked CSV plus report, or the failure
#[instrument(skip_all, fields(request_id = %request.request_id, bytes = request.body.len()))]
pub async fn process_request(
    request: ProcessRequest,
    deidentifier: Deidentifier,
) -> Result<ProcessResponse, PipelineError> {
    let ProcessRequest { request_id, body } = request;

    debug!("Dispatching pipeline to blocking pool");
    let output = tokio::task::spawn_blocking(move || deidentifier.deidentify_bytes(&body))
        .await
        .map_err(|e| PipelineError::Internal(format!("pipeline task failed: {}", e)))??;

    debug!(
        "Pipeline finished with {} entities found",
        output.counts.total()
    );
    Ok(ProcessResponse {
        request_id: request_id.to_string(),
        deidentified_csv: output.csv,
        report: output.report,
        entity_counts: output.counts,
    })
}
