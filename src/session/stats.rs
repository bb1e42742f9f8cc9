use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;

use super::config::WebcamPosition;
use crate::audio::{AudioConfig, AudioStatus};
use crate::export::MuxStatus;
use crate::video::CaptureStats;

/// Lifecycle of the recorder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// Accepted; countdown running or workers being spawned
    Starting,
    Active,
    /// Waiting for the workers and exporting
    Stopping,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub session_id: String,
    pub countdown: u32,
    pub webcam_size: u32,
    pub webcam_position: WebcamPosition,
    pub fps: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub recording: bool,
    pub state: SessionState,
    /// Frames captured so far, or by the last session when idle
    pub frame_count: usize,
    pub output_dir: PathBuf,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Local>>,
}

/// Result of a stop request: what was produced and how
#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub status: String,
    pub session_id: String,
    /// Best artifact produced: the muxed file, or an intermediate on failure
    pub file: Option<PathBuf>,
    pub frame_count: usize,
    pub output_fps: f64,
    pub mux_status: MuxStatus,
    pub audio_status: AudioStatus,
    pub audio_chunks: usize,
    pub capture: CaptureStats,
    pub warnings: Vec<String>,
}

/// Settings most recently applied (defaults until the first start)
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub webcam_size: u32,
    pub webcam_position: WebcamPosition,
    pub fps: u32,
    pub audio: AudioConfig,
}
