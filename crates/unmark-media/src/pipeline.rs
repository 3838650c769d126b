//! Decode, obscure and re-encode a whole video.
//!
//! The frame loop runs on tokio's blocking pool and writes a raw `mp4v`
//! intermediate next to the output (`<stem>_temp_video.mp4`). The
//! [`Encoder`] then turns that into the deliverable, restoring the source
//! audio when it can.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use serde::{Deserialize, Serialize};
use tracing::warn;
use unmark_models::{EncodingConfig, JobId, ObscureMethod, RegionDescriptor, REGION_PADDING};

use crate::encode::{EncodeOutcome, Encoder};
use crate::error::{MediaError, MediaResult};
use crate::extract::VideoSource;
use crate::fs_utils::remove_if_exists;
use crate::logging::JobLogger;
use crate::mask::compile_masks;
use crate::progress::{frame_percentage, ProgressSink};
use crate::transform::{FrameTransformer, TransformConfig};

/// Frames between progress reports.
pub const PROGRESS_INTERVAL: u64 = 30;

/// Appended to the output stem for the raw intermediate.
pub const RAW_SUFFIX: &str = "_temp_video.mp4";

/// Used when the container does not report a usable frame rate.
pub const FALLBACK_FPS: f64 = 30.0;

const RAW_FOURCC: [char; 4] = ['m', 'p', '4', 'v'];

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub progress_interval: u64,
    /// Pixels added around every region
    pub padding: i32,
    pub transform: TransformConfig,
    pub encoding: EncodingConfig,
    /// Per FFmpeg invocation; `None` waits indefinitely
    pub encode_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            progress_interval: PROGRESS_INTERVAL,
            padding: REGION_PADDING,
            transform: TransformConfig::default(),
            encoding: EncodingConfig::default(),
            encode_timeout_secs: None,
        }
    }
}

/// One processing run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub job_id: JobId,
    pub source: PathBuf,
    pub output: PathBuf,
    pub regions: Vec<RegionDescriptor>,
}

/// What the frame loop did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderStats {
    pub frames: u64,
    /// As reported by the container, 0 when unknown
    pub total_frames: u64,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    pub methods: Vec<ObscureMethod>,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub output: PathBuf,
    pub outcome: EncodeOutcome,
    pub render: RenderStats,
    pub elapsed_ms: u64,
}

/// `<dir>/<job_id>_temp_video.mp4` next to the output.
///
/// Keyed by job so runs that share an output name never share an intermediate.
pub fn raw_output_path(output: &Path, job_id: &JobId) -> PathBuf {
    output.with_file_name(format!("{}{}", job_id, RAW_SUFFIX))
}

/// Run the whole pipeline for one job.
///
/// Any decode, mask, transform or raw-write failure is returned and the raw
/// intermediate is removed. Encoder problems only degrade the outcome.
pub async fn process_video(
    request: PipelineRequest,
    config: &PipelineConfig,
    sink: Arc<dyn ProgressSink>,
) -> MediaResult<PipelineReport> {
    let logger = JobLogger::new(&request.job_id, "obscure");
    logger.log_start(&format!(
        "{} region(s) on {}",
        request.regions.len(),
        request.source.display()
    ));

    let raw = raw_output_path(&request.output, &request.job_id);

    let render = {
        let source = request.source.clone();
        let raw = raw.clone();
        let regions = request.regions.clone();
        let config = config.clone();
        let logger = logger.clone();

        tokio::task::spawn_blocking(move || {
            let _span = logger.span().entered();
            render_frames(&source, &raw, &regions, &config, sink.as_ref(), &logger)
        })
        .await
        .map_err(|e| MediaError::internal(format!("Frame loop task failed: {}", e)))
        .and_then(|result| result)
    };

    let render = match render {
        Ok(stats) => stats,
        Err(e) => {
            logger.log_error(&e.to_string());
            discard(&raw).await;
            return Err(e);
        }
    };

    let encoder = Encoder::new(config.encoding.clone()).with_timeout(config.encode_timeout_secs);
    let outcome = match encoder
        .finalize(&raw, &request.source, &request.output, &logger)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            logger.log_error(&format!("Could not place output: {}", e));
            discard(&raw).await;
            return Err(e);
        }
    };

    logger.log_completion(&format!("{} frames, {}", render.frames, outcome));

    Ok(PipelineReport {
        output: request.output,
        outcome,
        render,
        elapsed_ms: logger.elapsed().as_millis() as u64,
    })
}

async fn discard(raw: &Path) {
    if let Err(e) = remove_if_exists(raw).await {
        warn!("Failed to remove {}: {}", raw.display(), e);
    }
}

/// Decode `source`, obscure every frame and write the raw intermediate.
///
/// Blocking. Progress goes to `sink` every `progress_interval` frames.
pub fn render_frames(
    source: &Path,
    raw: &Path,
    regions: &[RegionDescriptor],
    config: &PipelineConfig,
    sink: &dyn ProgressSink,
    logger: &JobLogger,
) -> MediaResult<RenderStats> {
    let mut video = VideoSource::open(source)?;

    let width = video.width()?;
    let height = video.height()?;
    if width <= 0 || height <= 0 {
        return Err(MediaError::invalid_video(format!(
            "Reported frame size {}x{} is unusable",
            width, height
        )));
    }

    let total_frames = video.frame_count()?;
    let mut fps = video.fps()?;
    if !fps.is_finite() || fps <= 0.0 {
        logger.log_warning(&format!("No usable frame rate, writing at {} fps", FALLBACK_FPS));
        fps = FALLBACK_FPS;
    }

    let masks = compile_masks(regions, width, height, config.padding)?;
    let transformer = FrameTransformer::new(config.transform.clone());
    let mut writer = RawWriter::create(raw, fps, Size::new(width, height))?;

    let interval = config.progress_interval.max(1);
    let mut frames = 0u64;
    let mut logged_decile = 0u8;

    while let Some(frame) = video.read_frame()? {
        let obscured = transformer.apply_all(&frame, &masks)?;
        writer.write(&obscured)?;
        frames += 1;

        if frames % interval == 0 {
            if let Some(percent) = frame_percentage(frames, total_frames) {
                sink.report(percent);
                if percent / 10 > logged_decile {
                    logged_decile = percent / 10;
                    logger.log_progress(percent, frames);
                }
            }
        }
    }

    writer.finish()?;
    drop(video);

    if frames == 0 {
        return Err(MediaError::invalid_video("No frames could be decoded"));
    }

    Ok(RenderStats {
        frames,
        total_frames,
        fps,
        width,
        height,
        methods: masks.methods().collect(),
    })
}

/// Raw intermediate writer, released on drop.
struct RawWriter {
    writer: VideoWriter,
    path: PathBuf,
}

impl RawWriter {
    fn create(path: &Path, fps: f64, size: Size) -> MediaResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::internal(format!("Non UTF-8 path: {}", path.display())))?;

        let [a, b, c, d] = RAW_FOURCC;
        let fourcc = VideoWriter::fourcc(a, b, c, d)?;
        let writer = VideoWriter::new(path_str, fourcc, fps, size, true)?;
        if !writer.is_opened()? {
            return Err(MediaError::internal(format!(
                "Could not open raw writer at {}",
                path.display()
            )));
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    fn write(&mut self, frame: &Mat) -> MediaResult<()> {
        self.writer.write(frame)?;
        Ok(())
    }

    fn finish(mut self) -> MediaResult<()> {
        self.writer.release()?;
        Ok(())
    }
}

impl Drop for RawWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.release() {
            warn!("Failed to release writer for {}: {}", self.path.display(), e);
        }
    }
}
