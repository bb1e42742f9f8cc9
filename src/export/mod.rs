//! Turns captured buffers into files
//!
//! Frames are encoded to `{base}_temp.mp4` at a rate derived from their
//! timestamps, audio is written to `{base}_audio.wav`, and the two are muxed
//! into `loom_{base}.mp4`. Every failure degrades to the best artifact that
//! was written.

mod muxer;
mod video;
mod wav;

pub use muxer::{FfmpegMuxer, MuxCommandBuilder, Muxer};
pub use video::{FfmpegVideoEncoder, VideoEncoder};
pub use wav::write_wav;

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::audio::AudioConfig;
use crate::video::FrameBuffer;

/// Playback rate that makes the video span the same wall-clock time as the
/// capture: `frames / (last - first)`.
///
/// Falls back to `target_fps` with fewer than two timestamps or a
/// non-positive span.
pub fn derive_output_fps(timestamps: &[f64], target_fps: u32) -> f64 {
    let fallback = target_fps.max(1) as f64;
    match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) if timestamps.len() >= 2 => {
            let span = last - first;
            if span > 0.0 {
                timestamps.len() as f64 / span
            } else {
                fallback
            }
        }
        _ => fallback,
    }
}

/// Where one recording's files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub base_name: String,
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, name: Option<&str>) -> Self {
        Self::at(dir, name, Local::now())
    }

    /// Paths for `name`, or `recording_%Y%m%d_%H%M%S` of `now` without one
    pub fn at(dir: &Path, name: Option<&str>, now: DateTime<Local>) -> Self {
        let base_name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.replace(['/', '\\'], "_"),
            None => format!("recording_{}", now.format("%Y%m%d_%H%M%S")),
        };
        Self {
            video: dir.join(format!("{}_temp.mp4", base_name)),
            audio: dir.join(format!("{}_audio.wav", base_name)),
            output: dir.join(format!("loom_{}.mp4", base_name)),
            base_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MuxStatus {
    Muxed,
    /// Muxer ran and failed; the intermediate video is returned
    Failed,
    /// Video or audio was missing, so there was nothing to mux
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Best artifact written, if any
    pub file: Option<PathBuf>,
    pub frame_count: usize,
    pub output_fps: f64,
    pub mux_status: MuxStatus,
    pub video_written: bool,
    pub audio_written: bool,
    pub errors: Vec<String>,
}

pub struct ExportStage {
    encoder: Arc<dyn VideoEncoder>,
    muxer: Arc<dyn Muxer>,
}

impl ExportStage {
    pub fn new(encoder: Arc<dyn VideoEncoder>, muxer: Arc<dyn Muxer>) -> Self {
        Self { encoder, muxer }
    }

    /// ffmpeg for both encoding and muxing
    pub fn ffmpeg(binary: &str, mux_timeout: Duration) -> Self {
        Self::new(
            Arc::new(FfmpegVideoEncoder::new(binary)),
            Arc::new(FfmpegMuxer::new(binary, mux_timeout)),
        )
    }

    pub fn export(
        &self,
        frames: FrameBuffer,
        audio_chunks: Vec<Vec<u8>>,
        audio: &AudioConfig,
        target_fps: u32,
        paths: &ArtifactPaths,
    ) -> ExportReport {
        let mut errors = Vec::new();
        let frame_count = frames.len();
        let output_fps = derive_output_fps(frames.timestamps(), target_fps);
        let audio_offset = frames.first_timestamp().unwrap_or(0.0);

        if let Some(dir) = paths.output.parent() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                errors.push(format!("failed to create {}: {}", dir.display(), e));
            }
        }

        let video_written = if frames.is_empty() {
            info!("No frames captured; skipping video");
            false
        } else {
            match self.encoder.encode(frames.frames(), output_fps, &paths.video) {
                Ok(()) => {
                    info!(
                        "Video saved: {} frames at {:.2} fps",
                        frame_count, output_fps
                    );
                    true
                }
                Err(e) => {
                    error!("Failed to write video: {:#}", e);
                    errors.push(format!("video: {:#}", e));
                    false
                }
            }
        };
        drop(frames);

        let audio_written = if audio_chunks.is_empty() {
            info!("No audio captured; skipping audio");
            false
        } else {
            match write_wav(&paths.audio, &audio_chunks, audio) {
                Ok(samples) => {
                    info!("Audio saved: {} samples", samples);
                    true
                }
                Err(e) => {
                    error!("Failed to write audio: {:#}", e);
                    errors.push(format!("audio: {:#}", e));
                    false
                }
            }
        };

        let (file, mux_status) = match (video_written, audio_written) {
            (true, true) => {
                match self
                    .muxer
                    .mux(&paths.video, &paths.audio, audio_offset, &paths.output)
                {
                    Ok(output) => {
                        remove_intermediate(&paths.video);
                        remove_intermediate(&paths.audio);
                        info!("Final video saved: {}", output.display());
                        (Some(output), MuxStatus::Muxed)
                    }
                    Err(e) => {
                        warn!("Error merging audio and video: {:#}", e);
                        errors.push(format!("mux: {:#}", e));
                        (Some(paths.video.clone()), MuxStatus::Failed)
                    }
                }
            }
            (true, false) => (Some(paths.video.clone()), MuxStatus::Skipped),
            (false, true) => (Some(paths.audio.clone()), MuxStatus::Skipped),
            (false, false) => (None, MuxStatus::Skipped),
        };

        ExportReport {
            file,
            frame_count,
            output_fps,
            mux_status,
            video_written,
            audio_written,
            errors,
        }
    }
}

fn remove_intermediate(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
