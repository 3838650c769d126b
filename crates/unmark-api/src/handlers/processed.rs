//! Listing and fetching produced outputs, independent of any job.

use std::time::UNIX_EPOCH;

use axum::extract::{Path, Request, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use unmark_media::RAW_SUFFIX;
use unmark_models::is_safe_file_name;

use crate::error::{ApiError, ApiResult};
use crate::handlers::serve_file;
use crate::state::AppState;

/// Extensions listed by `GET /processed`.
const LISTED_EXTENSIONS: [&str; 3] = ["mp4", "m4v", "mov"];

#[derive(Debug, Serialize)]
pub struct ProcessedFile {
    pub name: String,
    pub size: u64,
    /// Modification time in unix seconds
    pub modified: f64,
}

#[derive(Debug, Serialize)]
pub struct ProcessedListResponse {
    pub files: Vec<ProcessedFile>,
}

/// GET /processed
///
/// Newest first.
pub async fn list_processed(State(state): State<AppState>) -> ApiResult<Json<ProcessedListResponse>> {
    let mut files = Vec::new();

    let mut entries = match tokio::fs::read_dir(state.storage.processed_dir()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Json(ProcessedListResponse { files }));
        }
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_listed(&name) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => continue,
        };

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        files.push(ProcessedFile {
            name,
            size: metadata.len(),
            modified,
        });
    }

    files.sort_by(|a, b| b.modified.total_cmp(&a.modified));

    Ok(Json(ProcessedListResponse { files }))
}

/// Finished outputs only; in-flight intermediates are skipped.
fn is_listed(name: &str) -> bool {
    if name.ends_with(RAW_SUFFIX) {
        return false;
    }
    name.rsplit_once('.')
        .map(|(_, ext)| LISTED_EXTENSIONS.iter().any(|l| l.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// GET /processed/:filename
pub async fn download_processed(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    if !is_safe_file_name(&filename) {
        return Err(ApiError::bad_request("Invalid file name"));
    }

    let path = state.storage.processed_path(&filename);
    if !tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
        return Err(ApiError::not_found("File not found"));
    }

    Ok(serve_file(&path, request, Some(&filename)).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_extensions() {
        assert!(is_listed("out.mp4"));
        assert!(is_listed("OUT.MOV"));
        assert!(is_listed("clip.m4v"));
        assert!(!is_listed("clip_temp.avi"));
        assert!(!is_listed("notes.txt"));
        assert!(!is_listed("mp4"));
        assert!(!is_listed("4f1c-job_temp_video.mp4"));
    }
}
