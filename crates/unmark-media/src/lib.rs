#![deny(unreachable_patterns)]
//! Video obscuring pipeline.
//!
//! This crate provides:
//! - Frame extraction and stream metadata through OpenCV
//! - Region-to-mask compilation and per-frame obscuring effects
//! - The decode, transform and raw-write frame loop
//! - Type-safe FFmpeg command building and the final encode/mux step
//! - Output name generation

pub mod command;
pub mod encode;
pub mod error;
pub mod extract;
pub mod fs_utils;
pub mod logging;
pub mod mask;
pub mod naming;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encode::{EncodeOutcome, Encoder};
pub use error::{MediaError, MediaResult};
pub use extract::{extract_frame, extract_preview, read_metadata, save_frame, VideoSource};
pub use fs_utils::{move_file, remove_files_in, remove_if_exists};
pub use logging::JobLogger;
pub use mask::{compile_masks, MaskSet};
pub use naming::{generate_stem, generate_stem_with, NameStyle};
pub use pipeline::{
    process_video, raw_output_path, render_frames, RAW_SUFFIX, PipelineConfig, PipelineReport,
    PipelineRequest, RenderStats,
};
pub use probe::{has_audio_stream, probe_video, VideoInfo};
pub use progress::{frame_percentage, FfmpegProgress, NoopProgress, ProgressSink};
pub use transform::{FrameTransformer, TransformConfig};
