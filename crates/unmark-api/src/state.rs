//! Application state.

use std::sync::Arc;

use unmark_media::PipelineConfig;

use crate::config::ApiConfig;
use crate::registry::JobRegistry;
use crate::storage::StorageLayout;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<JobRegistry>,
    pub storage: StorageLayout,
    pub pipeline: Arc<PipelineConfig>,
}

impl AppState {
    /// Create application state, creating the storage areas on disk.
    pub fn new(config: ApiConfig) -> std::io::Result<Self> {
        let storage = StorageLayout::new(&config.storage_dir);
        storage.ensure()?;

        let pipeline = Arc::new(config.pipeline_config());

        Ok(Self {
            config,
            registry: Arc::new(JobRegistry::new()),
            storage,
            pipeline,
        })
    }
}
