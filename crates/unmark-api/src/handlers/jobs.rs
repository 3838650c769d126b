//! Upload, preview, playback, progress and download handlers.

use std::path::Path as FsPath;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, Path, Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use unmark_media::{extract_preview, remove_if_exists};
use unmark_models::{
    format_bytes, has_allowed_extension, sanitize_filename, Job, JobId, JobStatus, VideoMetadata,
};

use crate::error::{ApiError, ApiResult};
use crate::handlers::serve_file;
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the video.
const UPLOAD_FIELD: &str = "video";

/// Upload response.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: JobId,
    pub preview_url: String,
    pub info: VideoMetadata,
}

/// Progress poll response.
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /upload
///
/// Stores the `video` field as `uploads/<job_id>_<name>`, writes a preview
/// frame and registers an `uploaded` job.
pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        return store_upload(&state, field).await.map(Json);
    }

    metrics::record_upload_rejected("missing_file");
    Err(ApiError::bad_request("No video file provided"))
}

async fn store_upload(state: &AppState, mut field: Field<'_>) -> ApiResult<UploadResponse> {
    let file_name = field.file_name().unwrap_or_default().trim().to_string();

    if file_name.is_empty() {
        metrics::record_upload_rejected("no_file_selected");
        return Err(ApiError::bad_request("No file selected"));
    }
    if !has_allowed_extension(&file_name) {
        metrics::record_upload_rejected("extension");
        return Err(ApiError::bad_request("File type not allowed"));
    }

    let job_id = JobId::new();
    let safe_name = stored_name(&file_name);
    let upload_path = state.storage.upload_path(&job_id, &safe_name);
    let preview_path = state.storage.preview_path(&job_id);

    let bytes = match write_field(&mut field, &upload_path, state.config.max_upload_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            metrics::record_upload_rejected("write");
            discard(&upload_path).await;
            return Err(e);
        }
    };

    let preview = {
        let upload_path = upload_path.clone();
        let preview_path = preview_path.clone();
        tokio::task::spawn_blocking(move || extract_preview(&upload_path, &preview_path)).await
    };

    let info = match preview {
        Ok(Ok(info)) => info,
        Ok(Err(e)) => {
            warn!(job_id = %job_id, "Rejecting unreadable upload: {}", e);
            metrics::record_upload_rejected("unreadable");
            discard(&upload_path).await;
            discard(&preview_path).await;
            return Err(ApiError::bad_request("Could not read video file"));
        }
        Err(e) => {
            discard(&upload_path).await;
            discard(&preview_path).await;
            return Err(ApiError::internal(format!("Preview task failed: {}", e)));
        }
    };

    info!(
        job_id = %job_id,
        name = %safe_name,
        size = %format_bytes(bytes),
        width = info.width,
        height = info.height,
        "Upload stored"
    );

    state
        .registry
        .create(Job::new(job_id.clone(), safe_name, upload_path, preview_path, info));
    metrics::record_upload(bytes);

    Ok(UploadResponse {
        preview_url: format!("/preview/{}", job_id),
        job_id,
        info,
    })
}

/// Sanitized storage name that still carries its video extension.
fn stored_name(file_name: &str) -> String {
    let safe = sanitize_filename(file_name);
    if has_allowed_extension(&safe) {
        return safe;
    }
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    format!("video.{}", ext)
}

/// Stream a multipart field to disk, enforcing the upload cap.
async fn write_field(field: &mut Field<'_>, path: &FsPath, limit: u64) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        written += chunk.len() as u64;
        if written > limit {
            return Err(too_large(limit));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

fn too_large(limit: u64) -> ApiError {
    ApiError::PayloadTooLarge(format!("File exceeds the {} upload limit", format_bytes(limit)))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("File too large".to_string())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

async fn discard(path: &FsPath) {
    if let Err(e) = remove_if_exists(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

/// GET /preview/:job_id
pub async fn preview(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let job = state.registry.get(&JobId::from(job_id))?;

    if !tokio::fs::try_exists(&job.preview_path).await.unwrap_or(false) {
        return Err(ApiError::not_found("Preview not found"));
    }

    Ok(serve_file(&job.preview_path, request, None).await)
}

/// GET /video/:job_id
///
/// Source playback, honouring `Range` requests.
pub async fn video(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let job = state.registry.get(&JobId::from(job_id))?;
    Ok(serve_file(&job.upload_path, request, None).await)
}

/// GET /progress/:job_id
pub async fn progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let job = state.registry.get(&JobId::from(job_id))?;

    Ok(Json(ProgressResponse {
        status: job.status,
        progress: job.progress,
        error: job.error,
    }))
}

/// GET /download/:job_id
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let job = state.registry.get(&JobId::from(job_id))?;

    let (Some(path), Some(name)) = (job.output_path.as_ref(), job.output_name.as_deref()) else {
        return Err(ApiError::bad_request("Video not ready"));
    };
    if !job.is_downloadable() {
        return Err(ApiError::bad_request("Video not ready"));
    }
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ApiError::not_found("Output file not found"));
    }

    Ok(serve_file(path, request, Some(name)).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_name_keeps_extension() {
        assert_eq!(stored_name("My Clip.mp4"), "My_Clip.mp4");
        assert_eq!(stored_name("....MOV"), "video.mov");
        assert_eq!(stored_name("??.webm"), "video.webm");
    }
}
