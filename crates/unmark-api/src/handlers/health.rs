//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use unmark_media::{check_ffmpeg, check_ffprobe};

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub storage: CheckStatus,
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
///
/// Missing storage directories make the server unready. A missing encoder only
/// degrades it, since processing still falls back to the raw output.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let storage_check = {
        let start = Instant::now();
        let mut missing = Vec::new();
        for dir in state.storage.areas() {
            if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
                missing.push(dir.display().to_string());
            }
        }
        if missing.is_empty() {
            CheckStatus::ok(start.elapsed().as_millis() as u64)
        } else {
            CheckStatus::error(format!("Missing storage directories: {}", missing.join(", ")))
        }
    };

    let ffmpeg_check = tool_check(check_ffmpeg);
    let ffprobe_check = tool_check(check_ffprobe);

    let storage_ok = storage_check.is_ok();
    let encoder_ok = ffmpeg_check.is_ok() && ffprobe_check.is_ok();

    let response = ReadinessResponse {
        status: if storage_ok && encoder_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            storage: storage_check,
            ffmpeg: ffmpeg_check,
            ffprobe: ffprobe_check,
        },
    };

    if storage_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

fn tool_check<T, E: ToString>(check: impl FnOnce() -> Result<T, E>) -> CheckStatus {
    let start = Instant::now();
    match check() {
        Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
        Err(e) => CheckStatus::error(e.to_string()),
    }
}
