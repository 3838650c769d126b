//! Shared data models for the Unmark backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their lifecycle status
//! - Region descriptors and obscuring methods
//! - Video stream metadata
//! - Encoding configuration
//! - Filename helpers shared by the API and the media pipeline

pub mod encoding;
pub mod job;
pub mod region;
pub mod utils;
pub mod video;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{Job, JobError, JobId, JobStatus};
pub use region::{ObscureMethod, PixelRect, RegionDescriptor, REGION_PADDING};
pub use utils::{
    format_bytes, has_allowed_extension, is_safe_file_name, output_file_name, sanitize_filename,
    ALLOWED_EXTENSIONS, OUTPUT_EXTENSION,
};
pub use video::VideoMetadata;
