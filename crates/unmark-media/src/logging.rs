//! Structured logging for pipeline runs.

use std::time::{Duration, Instant};

use tracing::{error, info, warn, Span};
use unmark_models::JobId;

/// Logs pipeline stages with the job ID and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
    started: Instant,
}

impl JobLogger {
    /// Create a logger for one operation on a job (e.g. "obscure", "encode").
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
            started: Instant::now(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a progress checkpoint.
    pub fn log_progress(&self, percent: u8, frames: u64) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            percent,
            frames,
            "Job progress"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "Job completed: {}", message
        );
    }

    /// Time since the logger was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the job fields, for work that logs through plain macros.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::from("job-42");
        let logger = JobLogger::new(&job_id, "obscure");

        assert_eq!(logger.job_id(), "job-42");
        assert_eq!(logger.operation(), "obscure");
        logger.log_start("3 regions");
        logger.log_progress(50, 150);
        logger.log_completion("done");
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let logger = JobLogger::new(&JobId::new(), "encode");
        let first = logger.elapsed();
        assert!(logger.elapsed() >= first);
    }
}
