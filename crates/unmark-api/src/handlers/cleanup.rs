//! Storage cleanup handlers.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use unmark_media::{remove_files_in, remove_if_exists};
use unmark_models::JobId;

use crate::metrics;
use crate::state::AppState;

/// Cleanup response.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub deleted: usize,
}

/// POST /cleanup/:job_id
///
/// Drops the job and removes its upload and preview. Processed output is kept.
/// Unknown jobs succeed with nothing deleted.
pub async fn cleanup_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Json<CleanupResponse> {
    let job_id = JobId::from(job_id);

    let deleted = match state.registry.delete(&job_id) {
        Some(job) => {
            let mut deleted = 0;
            for path in [&job.upload_path, &job.preview_path] {
                if remove_logged(path).await {
                    deleted += 1;
                }
            }
            info!(job_id = %job_id, deleted, "Job cleaned up");
            deleted
        }
        None => 0,
    };

    metrics::record_files_deleted("job", deleted);
    Json(CleanupResponse { success: true, deleted })
}

/// POST /cleanup-all
///
/// Empties the upload, preview and output areas and clears every job.
/// Per-file failures are logged and skipped.
pub async fn cleanup_all(State(state): State<AppState>) -> Json<CleanupResponse> {
    let mut deleted = 0;
    for dir in state.storage.areas() {
        deleted += remove_files_in(dir).await;
    }

    let jobs = state.registry.clear();
    info!(deleted, jobs, "All storage cleaned up");

    metrics::record_files_deleted("all", deleted);
    Json(CleanupResponse { success: true, deleted })
}

async fn remove_logged(path: &FsPath) -> bool {
    match remove_if_exists(path).await {
        Ok(removed) => removed,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}
