//! Process request handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use unmark_media::{
    generate_stem, process_video, EncodeOutcome, MediaResult, PipelineReport, PipelineRequest, ProgressSink,
};
use unmark_models::{output_file_name, JobId, ObscureMethod, RegionDescriptor};
use validator::{Validate, ValidationError};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::registry::{JobRegistry, RegistryProgress};
use crate::state::AppState;

/// Body of `POST /process`.
#[derive(Debug, Deserialize, Validate)]
pub struct ProcessRequest {
    #[serde(default)]
    pub job_id: String,

    /// Regions to obscure, as fractions of the frame
    #[serde(default)]
    #[validate(length(max = 256), custom(function = "validate_regions"))]
    pub masks: Vec<RegionDescriptor>,

    /// Output name; a random one is generated when blank
    #[serde(default)]
    #[validate(length(max = 200))]
    pub custom_name: Option<String>,
}

fn validate_regions(masks: &[RegionDescriptor]) -> Result<(), ValidationError> {
    if masks.iter().all(RegionDescriptor::is_normalized) {
        Ok(())
    } else {
        Err(ValidationError::new("region_out_of_range")
            .with_message("Region coordinates must be between 0 and 1".into()))
    }
}

/// Successful processing response.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub download_url: String,
    pub filename: String,
    pub outcome: EncodeOutcome,
}

/// POST /process
///
/// Runs the pipeline to completion before responding. The run itself lives in
/// its own task so the job still settles if the client goes away.
pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    let job_id = JobId::from(request.job_id.clone());
    let job = state.registry.get(&job_id)?;

    if request.masks.is_empty() {
        return Err(ApiError::bad_request("No regions selected"));
    }
    request.validate()?;

    let filename = output_file_name(request.custom_name.as_deref(), generate_stem);
    let output = state.storage.processed_path(&filename);

    // Leftover outputs of cleaned-up jobs are not in the registry
    let own_output = job.output_path.as_ref() == Some(&output);
    if !own_output && tokio::fs::try_exists(&output).await.unwrap_or(false) {
        return Err(ApiError::Conflict(format!("Output name {} is already in use", filename)));
    }

    state.registry.begin_processing(&job_id, &output, &filename)?;

    let methods: BTreeSet<ObscureMethod> = request.masks.iter().map(|r| r.method).collect();
    let method_names: Vec<&str> = methods.iter().map(ObscureMethod::as_str).collect();
    info!(
        job_id = %job_id,
        regions = request.masks.len(),
        methods = ?method_names,
        output = %filename,
        "Processing started"
    );
    metrics::record_job_started(&method_names);

    let pipeline_request = PipelineRequest {
        job_id: job_id.clone(),
        source: job.upload_path,
        output,
        regions: request.masks,
    };

    let task = {
        let registry = Arc::clone(&state.registry);
        let config = Arc::clone(&state.pipeline);
        let job_id = job_id.clone();

        tokio::spawn(async move {
            let sink: Arc<dyn ProgressSink> =
                Arc::new(RegistryProgress::new(Arc::clone(&registry), job_id.clone()));
            let result = process_video(pipeline_request, &config, sink).await;
            settle(&registry, &job_id, &result);
            result
        })
    };

    let report = match task.await {
        Ok(result) => result,
        Err(e) => {
            let message = format!("Processing task failed: {}", e);
            error!(job_id = %job_id, "{}", message);
            settle_failure(&state.registry, &job_id, &message);
            return Err(ApiError::internal(message));
        }
    };

    let report = report.map_err(|e| ApiError::Processing(e.to_string()))?;

    Ok(Json(ProcessResponse {
        success: true,
        download_url: format!("/download/{}", job_id),
        filename,
        outcome: report.outcome,
    }))
}

/// Move the job out of `processing` according to the pipeline result.
fn settle(registry: &JobRegistry, job_id: &JobId, result: &MediaResult<PipelineReport>) {
    match result {
        Ok(report) => {
            metrics::record_job_completed(
                report.outcome.as_str(),
                report.render.frames,
                report.elapsed_ms as f64 / 1000.0,
            );
            match registry.update(job_id, |job| job.complete()) {
                Ok(Ok(())) => info!(
                    job_id = %job_id,
                    outcome = %report.outcome,
                    frames = report.render.frames,
                    elapsed_ms = report.elapsed_ms,
                    "Processing completed"
                ),
                Ok(Err(e)) => warn!(job_id = %job_id, "Could not mark job completed: {}", e),
                Err(_) => debug!(job_id = %job_id, "Job removed before processing finished"),
            }
        }
        Err(e) => {
            error!(job_id = %job_id, "Processing failed: {}", e);
            settle_failure(registry, job_id, &e.to_string());
        }
    }
}

fn settle_failure(registry: &JobRegistry, job_id: &JobId, message: &str) {
    metrics::record_job_failed();
    match registry.update(job_id, |job| job.fail(message)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(job_id = %job_id, "Could not mark job failed: {}", e),
        Err(_) => debug!(job_id = %job_id, "Job removed before processing finished"),
    }
}
