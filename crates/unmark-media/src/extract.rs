//! Frame extraction and stream metadata through OpenCV `VideoCapture`.

use std::path::{Path, PathBuf};

use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use opencv::prelude::*;
use opencv::videoio::{
    VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_FRAMES,
};
use tracing::{debug, warn};
use unmark_models::VideoMetadata;

use crate::error::{MediaError, MediaResult};

/// An opened decode handle, released on drop.
pub struct VideoSource {
    capture: VideoCapture,
    path: PathBuf,
}

impl VideoSource {
    /// Open a container for decoding.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::invalid_video(format!("Non UTF-8 path: {}", path.display())))?;

        let capture = VideoCapture::from_file(path_str, CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(MediaError::invalid_video(format!(
                "Could not open video: {}",
                path.display()
            )));
        }

        Ok(Self {
            capture,
            path: path.to_path_buf(),
        })
    }

    /// Frame width in pixels.
    pub fn width(&self) -> MediaResult<i32> {
        Ok(self.capture.get(CAP_PROP_FRAME_WIDTH)? as i32)
    }

    /// Frame height in pixels.
    pub fn height(&self) -> MediaResult<i32> {
        Ok(self.capture.get(CAP_PROP_FRAME_HEIGHT)? as i32)
    }

    /// Nominal frame rate as reported by the container (may be 0).
    pub fn fps(&self) -> MediaResult<f64> {
        Ok(self.capture.get(CAP_PROP_FPS)?)
    }

    /// Frame count as reported by the container (0 when unknown).
    pub fn frame_count(&self) -> MediaResult<u64> {
        let frames = self.capture.get(CAP_PROP_FRAME_COUNT)?;
        Ok(if frames.is_finite() && frames > 0.0 { frames as u64 } else { 0 })
    }

    /// Stream metadata for the job record.
    pub fn metadata(&self) -> MediaResult<VideoMetadata> {
        Ok(VideoMetadata::from_stream(
            self.width()?.max(0) as u32,
            self.height()?.max(0) as u32,
            self.fps()?,
            self.frame_count()?,
        ))
    }

    /// Position the decoder so the next read returns frame `index`.
    pub fn seek(&mut self, index: u64) -> MediaResult<()> {
        if !self.capture.set(CAP_PROP_POS_FRAMES, index as f64)? {
            debug!("Seek to frame {} not supported by backend for {}", index, self.path.display());
        }
        Ok(())
    }

    /// Decode the next frame, `None` at end of stream.
    pub fn read_frame(&mut self) -> MediaResult<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    /// Path this source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release capture for {}: {}", self.path.display(), e);
        }
    }
}

/// Decode a single frame, seeking first when `index` is past the start.
///
/// Returns `None` when the file cannot be opened or the frame cannot be
/// decoded (corrupt data, unsupported codec, index beyond the last frame).
pub fn extract_frame(path: impl AsRef<Path>, index: u64) -> Option<Mat> {
    let path = path.as_ref();

    let result = VideoSource::open(path).and_then(|mut source| {
        if index > 0 {
            source.seek(index)?;
        }
        source.read_frame()
    });

    match result {
        Ok(frame) => frame,
        Err(e) => {
            debug!("No frame {} from {}: {}", index, path.display(), e);
            None
        }
    }
}

/// Read width, height, fps, frame count and duration from a video.
pub fn read_metadata(path: impl AsRef<Path>) -> MediaResult<VideoMetadata> {
    VideoSource::open(path)?.metadata()
}

/// Write a frame as an image; the format follows the file extension.
pub fn save_frame(frame: &Mat, path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| MediaError::internal(format!("Non UTF-8 path: {}", path.display())))?;

    if !imgcodecs::imwrite(path_str, frame, &Vector::<i32>::new())? {
        return Err(MediaError::internal(format!(
            "Failed to encode image {}",
            path.display()
        )));
    }
    Ok(())
}

/// Read metadata and write the first frame of `video` as a JPEG preview.
///
/// Fails with [`MediaError::InvalidVideo`] when no frame can be decoded.
pub fn extract_preview(video: impl AsRef<Path>, preview: impl AsRef<Path>) -> MediaResult<VideoMetadata> {
    let video = video.as_ref();

    let frame = extract_frame(video, 0)
        .ok_or_else(|| MediaError::invalid_video("Could not read video file"))?;
    let metadata = read_metadata(video)?;

    save_frame(&frame, preview)?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_test_video;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_no_frame() {
        assert!(extract_frame("/nonexistent/clip.mp4", 0).is_none());
        assert!(matches!(
            read_metadata("/nonexistent/clip.mp4"),
            Err(MediaError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_garbage_file_yields_no_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.mp4");
        std::fs::write(&path, b"definitely not a video container").unwrap();

        assert!(extract_frame(&path, 0).is_none());
        let preview = dir.path().join("preview.jpg");
        assert!(extract_preview(&path, &preview).is_err());
        assert!(!preview.exists());
    }

    #[test]
    fn test_extract_first_and_later_frames() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("gradient.avi");
        write_test_video(&video, 64, 48, 12).unwrap();

        let first = extract_frame(&video, 0).unwrap();
        assert_eq!((first.cols(), first.rows()), (64, 48));
        assert_eq!(first.channels(), 3);

        assert!(extract_frame(&video, 5).is_some());
        assert!(extract_frame(&video, 500).is_none());
    }

    #[test]
    fn test_extract_preview_writes_jpeg() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("gradient.avi");
        let preview = dir.path().join("frames").join("job_preview.jpg");
        write_test_video(&video, 64, 48, 12).unwrap();

        let metadata = extract_preview(&video, &preview).unwrap();
        assert_eq!((metadata.width, metadata.height), (64, 48));
        assert!(metadata.fps > 0.0);

        let bytes = std::fs::read(&preview).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
