//! Job records tracking one upload-through-download lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::VideoMetadata;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Source video stored and previewed, waiting for regions
    #[default]
    Uploaded,
    /// Frames are being transformed and encoded
    Processing,
    /// Output file is ready for download
    Completed,
    /// Processing failed; see the job's error message
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state for a processing run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Illegal job status transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job {0} is already processing")]
    AlreadyProcessing(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

/// A server-side job record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Sanitized name of the uploaded file
    pub original_name: String,

    /// Where the uploaded source video is stored
    pub upload_path: PathBuf,

    /// Where the preview JPEG is stored
    pub preview_path: PathBuf,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Output file path, set once processing starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Output file name offered on download
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,

    /// Error message from the last failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Cached stream metadata read at upload time
    pub info: VideoMetadata,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a freshly uploaded job.
    pub fn new(
        id: JobId,
        original_name: impl Into<String>,
        upload_path: impl Into<PathBuf>,
        preview_path: impl Into<PathBuf>,
        info: VideoMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            original_name: original_name.into(),
            upload_path: upload_path.into(),
            preview_path: preview_path.into(),
            status: JobStatus::Uploaded,
            progress: 0,
            output_path: None,
            output_name: None,
            error: None,
            info,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move into `processing`, recording where the output will be written.
    ///
    /// Rejected while a run is already active. Completed and failed jobs may be
    /// processed again with a new region set.
    pub fn start_processing(
        &mut self,
        output_path: impl Into<PathBuf>,
        output_name: impl Into<String>,
    ) -> Result<(), JobError> {
        if self.status == JobStatus::Processing {
            return Err(JobError::AlreadyProcessing(self.id.clone()));
        }
        self.status = JobStatus::Processing;
        self.output_path = Some(output_path.into());
        self.output_name = Some(output_name.into());
        self.error = None;
        self.progress = 0;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record progress reported by the pipeline.
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
    }

    /// Mark the run as completed.
    pub fn complete(&mut self) -> Result<(), JobError> {
        self.ensure_processing(JobStatus::Completed)?;
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the run as failed. Progress keeps its last reported value.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.ensure_processing(JobStatus::Error)?;
        self.status = JobStatus::Error;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether the output is ready for download.
    pub fn is_downloadable(&self) -> bool {
        self.status == JobStatus::Completed && self.output_path.is_some()
    }

    fn ensure_processing(&self, to: JobStatus) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::new(
            JobId::from("job-1"),
            "clip.mp4",
            "/tmp/uploads/job-1_clip.mp4",
            "/tmp/frames/job-1_preview.jpg",
            VideoMetadata::default(),
        )
    }

    #[test]
    fn test_new_job_is_uploaded() {
        let job = sample_job();
        assert_eq!(job.status, JobStatus::Uploaded);
        assert_eq!(job.progress, 0);
        assert!(!job.is_downloadable());
    }

    #[test]
    fn test_successful_lifecycle() {
        let mut job = sample_job();
        job.start_processing("/tmp/processed/out.mp4", "out.mp4").unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        job.set_progress(42);
        job.complete().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.is_downloadable());
    }

    #[test]
    fn test_failure_keeps_progress() {
        let mut job = sample_job();
        job.start_processing("/tmp/processed/out.mp4", "out.mp4").unwrap();
        job.set_progress(37);
        job.fail("decode failed").unwrap();

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 37);
        assert_eq!(job.error.as_deref(), Some("decode failed"));
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_rejects_concurrent_processing() {
        let mut job = sample_job();
        job.start_processing("/tmp/a.mp4", "a.mp4").unwrap();
        let err = job.start_processing("/tmp/b.mp4", "b.mp4").unwrap_err();
        assert_eq!(err, JobError::AlreadyProcessing(JobId::from("job-1")));
        assert_eq!(job.output_name.as_deref(), Some("a.mp4"));
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut job = sample_job();
        assert!(job.complete().is_err());
        assert!(job.fail("nope").is_err());
        assert_eq!(job.status, JobStatus::Uploaded);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut job = sample_job();
        job.set_progress(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&JobStatus::Uploaded).unwrap(), "\"uploaded\"");
        assert_eq!(serde_json::to_string(&JobStatus::Error).unwrap(), "\"error\"");
        assert_eq!(JobStatus::Processing.to_string(), "processing");
    }
}
