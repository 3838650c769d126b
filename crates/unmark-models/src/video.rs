//! Video stream metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stream properties cached on a job at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct VideoMetadata {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Total frame count reported by the container
    pub frames: u64,
    /// Duration in whole seconds
    pub duration: u64,
}

impl VideoMetadata {
    /// Build metadata from raw stream properties, deriving the duration.
    pub fn from_stream(width: u32, height: u32, fps: f64, frames: u64) -> Self {
        Self {
            width,
            height,
            fps,
            frames,
            duration: whole_seconds(frames, fps),
        }
    }

    /// Precise duration in seconds, 0.0 when the frame rate is unknown.
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frames as f64 / self.fps
        } else {
            0.0
        }
    }
}

fn whole_seconds(frames: u64, fps: f64) -> u64 {
    if fps.is_finite() && fps > 0.0 {
        (frames as f64 / fps) as u64
    } else {
        0
    }
}
