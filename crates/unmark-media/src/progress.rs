//! Progress reporting for the frame loop and FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Receives coarse percentage updates from a running pipeline.
///
/// Called from the blocking frame loop, so implementations must be cheap and
/// must not block on async work.
pub trait ProgressSink: Send + Sync {
    /// Report completion in percent, already clamped to `0..=100`.
    fn report(&self, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(u8) + Send + Sync,
{
    fn report(&self, percent: u8) {
        self(percent)
    }
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _percent: u8) {}
}

/// Percentage of `frames` out of `total`, rounded and clamped to 100.
///
/// Returns `None` when the total is unknown.
pub fn frame_percentage(frames: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let percent = (frames as f64 / total as f64 * 100.0).round();
    Some(percent.clamp(0.0, 100.0) as u8)
}

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_frame_percentage() {
        assert_eq!(frame_percentage(30, 300), Some(10));
        assert_eq!(frame_percentage(1, 3), Some(33));
        assert_eq!(frame_percentage(2, 3), Some(67));
        assert_eq!(frame_percentage(310, 300), Some(100));
        assert_eq!(frame_percentage(30, 0), None);
    }

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |percent: u8| seen.lock().unwrap().push(percent);

        sink.report(10);
        sink.report(20);
        NoopProgress.report(50);

        assert_eq!(*seen.lock().unwrap(), vec![10, 20]);
    }

    #[test]
    fn test_ffmpeg_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(5000) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }
}
