//! In-memory job registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::debug;
use unmark_media::ProgressSink;
use unmark_models::{Job, JobError, JobId};

/// Registry lookup and transition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Output {0} belongs to another job")]
    OutputInUse(String),

    #[error(transparent)]
    Job(#[from] JobError),
}

/// Owns every job record. Not persisted across restarts.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the map itself consistent
    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a job, replacing any record with the same ID.
    pub fn create(&self, job: Job) {
        self.write().insert(job.id.clone(), job);
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &JobId) -> Result<Job, RegistryError> {
        self.read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Run `mutator` on a job under the write lock.
    pub fn update<R>(&self, id: &JobId, mutator: impl FnOnce(&mut Job) -> R) -> Result<R, RegistryError> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        Ok(mutator(job))
    }

    /// Check-and-set into `processing`.
    ///
    /// Fails if the job is already processing or another job already owns
    /// `output_path`.
    pub fn begin_processing(
        &self,
        id: &JobId,
        output_path: impl Into<PathBuf>,
        output_name: impl Into<String>,
    ) -> Result<Job, RegistryError> {
        let output_path = output_path.into();
        let output_name = output_name.into();
        let mut jobs = self.write();

        if !jobs.contains_key(id) {
            return Err(RegistryError::NotFound(id.clone()));
        }
        let taken = jobs
            .values()
            .any(|other| other.id != *id && other.output_path.as_ref() == Some(&output_path));
        if taken {
            return Err(RegistryError::OutputInUse(output_name));
        }

        let job = jobs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        job.start_processing(output_path, output_name)?;
        Ok(job.clone())
    }

    /// Remove a job, returning its last state.
    pub fn delete(&self, id: &JobId) -> Option<Job> {
        self.write().remove(id)
    }

    /// Remove every job, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut jobs = self.write();
        let count = jobs.len();
        jobs.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Writes pipeline progress into a job record.
pub struct RegistryProgress {
    registry: Arc<JobRegistry>,
    job_id: JobId,
}

impl RegistryProgress {
    pub fn new(registry: Arc<JobRegistry>, job_id: JobId) -> Self {
        Self { registry, job_id }
    }
}

impl ProgressSink for RegistryProgress {
    fn report(&self, percent: u8) {
        // The job may have been cleaned up mid-run
        if self
            .registry
            .update(&self.job_id, |job| job.set_progress(percent))
            .is_err()
        {
            debug!(job_id = %self.job_id, "Progress for a job that no longer exists");
        }
    }
}
