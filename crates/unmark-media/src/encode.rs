//! Final encode of the raw OpenCV output, with audio from the source when possible.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use unmark_models::EncodingConfig;

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, remove_if_exists};
use crate::logging::JobLogger;
use crate::probe::has_audio_stream;

/// How the final output file was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeOutcome {
    /// Re-encoded video with the source's first audio stream
    MergedWithAudio,
    /// Re-encoded video without audio
    VideoOnly,
    /// The raw intermediate moved into place unchanged
    RawFallback,
}

impl EncodeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeOutcome::MergedWithAudio => "merged_with_audio",
            EncodeOutcome::VideoOnly => "video_only",
            EncodeOutcome::RawFallback => "raw_fallback",
        }
    }

    pub fn has_audio(&self) -> bool {
        matches!(self, EncodeOutcome::MergedWithAudio)
    }
}

impl fmt::Display for EncodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns the raw intermediate into the deliverable file.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    config: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl Encoder {
    pub fn new(config: EncodingConfig) -> Self {
        Self {
            config,
            timeout_secs: None,
        }
    }

    /// Kill each FFmpeg run after `secs` seconds. `None` waits indefinitely.
    pub fn with_timeout(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Re-encode `raw` and mux the first audio stream of `source`.
    pub fn merge_command(&self, raw: &Path, source: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(raw, output)
            .input(source)
            .map("0:v:0")
            .map("1:a:0")
            .output_args(self.config.video_args())
            .output_args(self.config.audio_args())
            .shortest()
    }

    /// Re-encode `raw` without audio.
    pub fn video_only_command(&self, raw: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(raw, output)
            .output_args(self.config.video_args())
            .no_audio()
    }

    /// Produce `output` from `raw`, degrading step by step.
    ///
    /// Encoder failures never fail the call: a failed audio merge retries as
    /// video only, and a failed video-only encode (or a missing `ffmpeg`)
    /// moves the raw file into place. Only a failure of that final move is
    /// returned as an error. `raw` no longer exists when this returns `Ok`.
    pub async fn finalize(
        &self,
        raw: &Path,
        source: &Path,
        output: &Path,
        logger: &JobLogger,
    ) -> MediaResult<EncodeOutcome> {
        if check_ffmpeg().is_err() {
            logger.log_warning("FFmpeg not found, keeping the raw OpenCV output");
            return self.keep_raw(raw, output).await;
        }

        let runner = FfmpegRunner::new().with_optional_timeout(self.timeout_secs);

        if has_audio_stream(source).await {
            match runner.run(&self.merge_command(raw, source, output)).await {
                Ok(()) => return self.finish(raw, EncodeOutcome::MergedWithAudio, logger).await,
                Err(e) => logger.log_warning(&format!(
                    "Audio merge failed, retrying without audio: {}",
                    describe(&e)
                )),
            }
        }

        match runner.run(&self.video_only_command(raw, output)).await {
            Ok(()) => self.finish(raw, EncodeOutcome::VideoOnly, logger).await,
            Err(e) => {
                logger.log_warning(&format!(
                    "Video encode failed, keeping the raw OpenCV output: {}",
                    describe(&e)
                ));
                self.keep_raw(raw, output).await
            }
        }
    }

    async fn finish(&self, raw: &Path, outcome: EncodeOutcome, logger: &JobLogger) -> MediaResult<EncodeOutcome> {
        if let Err(e) = remove_if_exists(raw).await {
            logger.log_warning(&format!("Failed to remove {}: {}", raw.display(), e));
        }
        Ok(outcome)
    }

    async fn keep_raw(&self, raw: &Path, output: &Path) -> MediaResult<EncodeOutcome> {
        move_file(raw, output).await?;
        Ok(EncodeOutcome::RawFallback)
    }
}

/// Error text including the FFmpeg stderr tail when there is one.
fn describe(err: &MediaError) -> String {
    match err {
        MediaError::FfmpegFailed {
            stderr: Some(stderr),
            ..
        } => format!("{}\n{}", err, stderr),
        other => other.to_string(),
    }
}
