//! On-disk layout of uploads, previews and outputs.

use std::path::{Path, PathBuf};

use unmark_models::JobId;

/// The three storage areas under one root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    uploads: PathBuf,
    frames: PathBuf,
    processed: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            uploads: root.join("uploads"),
            frames: root.join("frames"),
            processed: root.join("processed"),
            root,
        }
    }

    /// Create every area that does not exist yet.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in self.areas() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Upload, preview and output directories.
    pub fn areas(&self) -> [&Path; 3] {
        [self.uploads.as_path(), self.frames.as_path(), self.processed.as_path()]
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed
    }

    /// `uploads/<job_id>_<name>`; `safe_name` must already be sanitized.
    pub fn upload_path(&self, job_id: &JobId, safe_name: &str) -> PathBuf {
        self.uploads.join(format!("{}_{}", job_id, safe_name))
    }

    /// `frames/<job_id>_preview.jpg`
    pub fn preview_path(&self, job_id: &JobId) -> PathBuf {
        self.frames.join(format!("{}_preview.jpg", job_id))
    }

    /// `processed/<file_name>`; `file_name` must already be validated.
    pub fn processed_path(&self, file_name: &str) -> PathBuf {
        self.processed.join(file_name)
    }
}
