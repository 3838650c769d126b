//! FFprobe video information and audio stream detection.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::{check_ffmpeg, check_ffprobe};
use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Number of video frames when the container reports it
    pub frame_count: Option<u64>,
    /// Video codec
    pub codec: String,
    /// Whether the file carries at least one audio stream
    pub has_audio: bool,
    /// File size in bytes
    pub size: u64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Parse `ffprobe -print_format json` output.
fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .or(video_stream.r_frame_rate.as_ref())
        .and_then(|r| parse_frame_rate(r))
        .unwrap_or(30.0);

    let frame_count = video_stream
        .nb_frames
        .as_ref()
        .and_then(|n| n.parse::<u64>().ok());

    Ok(VideoInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        frame_count,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        has_audio,
        size,
    })
}

/// Detect whether a media file has an audio stream.
///
/// Uses ffprobe's stream listing when available and falls back to scanning
/// the stream summary `ffmpeg -i` prints on stderr. Any failure reads as
/// "no audio".
pub async fn has_audio_stream(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();

    match probe_video(path).await {
        Ok(info) => return info.has_audio,
        Err(e) => debug!("ffprobe audio detection failed for {}: {}", path.display(), e),
    }

    match scan_ffmpeg_banner(path).await {
        Ok(has_audio) => has_audio,
        Err(e) => {
            debug!("ffmpeg audio detection failed for {}: {}", path.display(), e);
            false
        }
    }
}

/// Run `ffmpeg -i <path>` without an output and inspect the stream summary.
async fn scan_ffmpeg_banner(path: &Path) -> MediaResult<bool> {
    let ffmpeg = check_ffmpeg()?;

    // Exits non-zero because no output is given; only stderr matters
    let output = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-i")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    Ok(stderr_reports_audio(&String::from_utf8_lossy(&output.stderr)))
}

/// Whether an FFmpeg stream summary lists an audio stream.
fn stderr_reports_audio(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.trim_start().starts_with("Stream #") && line.contains("Audio:"))
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 640, "height": 360,
                 "avg_frame_rate": "30/1", "nb_frames": "300"},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "10.000000", "size": "1048576"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (640, 360));
        assert!((info.fps - 30.0).abs() < 0.01);
        assert_eq!(info.frame_count, Some(300));
        assert!(info.has_audio);
        assert_eq!(info.codec, "h264");
        assert_eq!(info.size, 1_048_576);
    }

    #[test]
    fn test_parse_probe_output_without_audio() {
        let json = br#"{"streams": [{"codec_type": "video", "width": 320, "height": 240}], "format": {}}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.frame_count, None);
        assert!((info.fps - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_probe_output_requires_video() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        assert!(matches!(parse_probe_output(json), Err(MediaError::InvalidVideo(_))));
    }

    #[test]
    fn test_stderr_reports_audio() {
        let with_audio = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':\n  \
            Stream #0:0[0x1](und): Video: h264 (High), yuv420p, 640x360, 30 fps\n  \
            Stream #0:1[0x2](und): Audio: aac (LC), 44100 Hz, stereo, fltp, 128 kb/s\n\
            At least one output file must be specified";
        assert!(stderr_reports_audio(with_audio));

        let video_only = "  Stream #0:0: Video: mpeg4 (Simple Profile), yuv420p, 640x360\n\
            At least one output file must be specified";
        assert!(!stderr_reports_audio(video_only));
    }

    #[tokio::test]
    async fn test_missing_file_has_no_audio() {
        assert!(!has_audio_stream("/nonexistent/clip.mp4").await);
    }
}
