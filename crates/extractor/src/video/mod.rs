//! Video frame sampling
//!
//! Samples one frame every `interval_secs` up to `max_frames`, so long
//! videos are never decoded at full frame rate. Frames are written as JPEG
//! files into a per-document directory; the caller records one row per
//! frame and serves them back by index.

use crate::errors::ExtractError;
use quarry_common::config::VideoConfig;
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Frame sampling parameters; always configuration, never hard constants
#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub ffmpeg_binary: String,
    pub ffprobe_binary: String,
    pub interval_secs: u64,
    pub max_frames: usize,
}

impl From<&VideoConfig> for FrameConfig {
    fn from(config: &VideoConfig) -> Self {
        Self {
            ffmpeg_binary: config.ffmpeg_binary.clone(),
            ffprobe_binary: config.ffprobe_binary.clone(),
            interval_secs: config.frame_interval_secs.max(1),
            max_frames: config.max_frames.max(1),
        }
    }
}

/// One sampled frame on disk
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Zero-based frame index, the retrieval key
    pub index: i64,
    /// File name within the output directory
    pub filename: String,
    /// Position within the video, in seconds
    pub timestamp_secs: f64,
}

/// Result of sampling one video
#[derive(Debug, Clone)]
pub struct SampledVideo {
    pub frames: Vec<SampledFrame>,
    pub duration_secs: f64,
}

/// Frame sampler driving ffprobe/ffmpeg
#[derive(Debug, Clone)]
pub struct FrameSampler {
    config: FrameConfig,
}

impl FrameSampler {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    /// Container duration in seconds, via ffprobe
    async fn probe_duration(&self, input: &Path) -> Result<f64, ExtractError> {
        let output = Command::new(&self.config.ffprobe_binary)
            .args(["-v", "error", "-show_entries", "format=duration", "-of"])
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(input)
            .output()
            .await
            .map_err(|e| ExtractError::Tool {
                tool: "ffprobe",
                message: format!("failed to run {}: {}", self.config.ffprobe_binary, e),
            })?;

        if !output.status.success() {
            return Err(ExtractError::Unreadable(format!(
                "could not open video container: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            ExtractError::Unreadable("video container reports no duration".to_string())
        })
    }

    /// Sample frames into `out_dir`, returning them in index order
    #[instrument(skip(self), fields(input = %input.display()))]
    pub async fn sample(&self, input: &Path, out_dir: &Path) -> Result<SampledVideo, ExtractError> {
        let duration_secs = self.probe_duration(input).await?;

        fs::create_dir_all(out_dir).await?;
        let pattern = out_dir.join("%05d.jpg");

        let output = Command::new(&self.config.ffmpeg_binary)
            .args(["-v", "error", "-y", "-i"])
            .arg(input)
            .args([
                "-vf",
                &format!("fps=1/{}", self.config.interval_secs),
                "-frames:v",
                &self.config.max_frames.to_string(),
                "-q:v",
                "4",
            ])
            .arg(&pattern)
            .output()
            .await
            .map_err(|e| ExtractError::Tool {
                tool: "ffmpeg",
                message: format!("failed to run {}: {}", self.config.ffmpeg_binary, e),
            })?;

        if !output.status.success() {
            return Err(ExtractError::Unreadable(format!(
                "frame extraction failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut filenames = Vec::new();
        let mut entries = fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".jpg") {
                filenames.push(name);
            }
        }
        filenames.sort();

        if filenames.is_empty() {
            return Err(ExtractError::Unreadable(
                "video contains no decodable frames".to_string(),
            ));
        }

        let frames = filenames
            .into_iter()
            .enumerate()
            .map(|(i, filename)| SampledFrame {
                index: i as i64,
                filename,
                timestamp_secs: (i as u64 * self.config.interval_secs) as f64,
            })
            .collect::<Vec<_>>();

        debug!(
            frames = frames.len(),
            duration_secs,
            interval = self.config.interval_secs,
            "Video frame sampling complete"
        );

        Ok(SampledVideo {
            frames,
            duration_secs,
        })
    }
}

/// Parse ffprobe's duration output ("12.345\n")
fn parse_duration(stdout: &str) -> Option<f64> {
    let duration = stdout.trim().parse::<f64>().ok()?;
    if duration.is_finite() && duration > 0.0 {
        Some(duration)
    } else {
        None
    }
}

/// Number of frames `fps=1/interval` yields for a video of the given
/// duration, before the `max_frames` cap
pub fn expected_frame_count(duration_secs: f64, interval_secs: u64, max_frames: usize) -> usize {
    if duration_secs <= 0.0 {
        return 0;
    }
    let sampled = (duration_secs / interval_secs.max(1) as f64).ceil() as usize;
    sampled.max(1).min(max_frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thirty_second_video_at_five_second_interval() {
        // One frame per 5 seconds, max 10 frames: exactly 6 frames
        assert_eq!(expected_frame_count(30.0, 5, 10), 6);
    }

    #[test]
    fn test_max_frames_caps_long_videos() {
        assert_eq!(expected_frame_count(3600.0, 5, 10), 10);
    }

    #[test]
    fn test_short_video_still_yields_one_frame() {
        assert_eq!(expected_frame_count(2.0, 5, 10), 1);
    }

    #[test]
    fn test_zero_duration_yields_nothing() {
        assert_eq!(expected_frame_count(0.0, 5, 10), 0);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30.500000\n"), Some(30.5));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-1.0"), None);
    }
}
