use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::AudioConfig;
use crate::video::{Anchor, PacingPolicy, RingStyle, VideoWorkerConfig};

/// Largest webcam overlay accepted, in pixels
pub const MAX_WEBCAM_SIZE: u32 = 250;

/// Highest capture rate accepted
pub const MAX_FPS: u32 = 20;

/// Gap between the overlay and the screen edges
pub const OVERLAY_MARGIN: i64 = 30;

pub const DEFAULT_WEBCAM_SIZE: u32 = 200;
pub const DEFAULT_FPS: u32 = 20;

/// Corner of the screen the webcam overlay sits in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum WebcamPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl From<String> for WebcamPosition {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for WebcamPosition {
    /// Unknown names fall back to bottom-right
    fn from(value: &str) -> Self {
        match value {
            "bottom-left" => WebcamPosition::BottomLeft,
            "top-right" => WebcamPosition::TopRight,
            "top-left" => WebcamPosition::TopLeft,
            _ => WebcamPosition::BottomRight,
        }
    }
}

impl fmt::Display for WebcamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WebcamPosition::BottomRight => "bottom-right",
            WebcamPosition::BottomLeft => "bottom-left",
            WebcamPosition::TopRight => "top-right",
            WebcamPosition::TopLeft => "top-left",
        };
        f.write_str(name)
    }
}

/// Size and placement of the webcam overlay for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebcamConfig {
    pub size: u32,
    pub position: WebcamPosition,
}

impl Default for WebcamConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_WEBCAM_SIZE,
            position: WebcamPosition::default(),
        }
    }
}

impl WebcamConfig {
    /// Size clamped to `1..=MAX_WEBCAM_SIZE`
    pub fn new(size: u32, position: WebcamPosition) -> Self {
        Self {
            size: clamp_webcam_size(size),
            position,
        }
    }

    /// Top-left corner of the overlay on a `width × height` screen.
    ///
    /// Negative when the screen is too small to hold the overlay.
    pub fn anchor(&self, width: u32, height: u32) -> Anchor {
        let size = self.size as i64;
        let (w, h) = (width as i64, height as i64);
        let m = OVERLAY_MARGIN;
        match self.position {
            WebcamPosition::BottomRight => Anchor::new(w - size - m, h - size - m),
            WebcamPosition::BottomLeft => Anchor::new(m, h - size - m),
            WebcamPosition::TopRight => Anchor::new(w - size - m, m),
            WebcamPosition::TopLeft => Anchor::new(m, m),
        }
    }
}

pub fn clamp_webcam_size(size: u32) -> u32 {
    size.clamp(1, MAX_WEBCAM_SIZE)
}

pub fn clamp_fps(fps: u32) -> u32 {
    fps.clamp(1, MAX_FPS)
}

/// Body of a start request; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    pub webcam_size: Option<u32>,
    pub webcam_position: Option<WebcamPosition>,
    pub fps: Option<u32>,
    /// Seconds to wait before the workers start
    pub countdown: Option<u32>,
    /// Base name for the artifacts; a timestamped name is used otherwise
    pub output_name: Option<String>,
}

/// Long-lived recorder defaults, loaded from configuration
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub output_dir: PathBuf,
    pub webcam: WebcamConfig,
    pub fps: u32,
    pub pacing: PacingPolicy,
    pub camera_read_attempts: u32,
    pub ring: RingStyle,
    pub audio: AudioConfig,
    /// How long stop waits for each worker to hand back its buffers
    pub stop_grace: Duration,
    pub camera_warmup_frames: u32,
    pub camera_warmup_interval: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Recordings"),
            webcam: WebcamConfig::default(),
            fps: DEFAULT_FPS,
            pacing: PacingPolicy::default(),
            camera_read_attempts: 1,
            ring: RingStyle::default(),
            audio: AudioConfig::default(),
            stop_grace: Duration::from_secs(3),
            camera_warmup_frames: 10,
            camera_warmup_interval: Duration::from_millis(50),
        }
    }
}

/// Everything one recording needs, fixed when the start request is accepted
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_id: String,
    pub webcam: WebcamConfig,
    pub fps: u32,
    pub pacing: PacingPolicy,
    pub camera_read_attempts: u32,
    pub ring: RingStyle,
    pub audio: AudioConfig,
    pub countdown: Duration,
    pub output_dir: PathBuf,
    pub output_name: Option<String>,
    pub camera_warmup_frames: u32,
    pub camera_warmup_interval: Duration,
}

impl SessionConfig {
    /// Apply a start request on top of the recorder defaults, clamping
    /// webcam size and fps
    pub fn from_request(settings: &RecorderSettings, request: &StartRequest) -> Self {
        let webcam = WebcamConfig::new(
            request.webcam_size.unwrap_or(settings.webcam.size),
            request.webcam_position.unwrap_or(settings.webcam.position),
        );
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            webcam,
            fps: clamp_fps(request.fps.unwrap_or(settings.fps)),
            pacing: settings.pacing,
            camera_read_attempts: settings.camera_read_attempts,
            ring: settings.ring,
            audio: settings.audio.clone(),
            countdown: Duration::from_secs(request.countdown.unwrap_or(0) as u64),
            output_dir: settings.output_dir.clone(),
            output_name: request
                .output_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            camera_warmup_frames: settings.camera_warmup_frames,
            camera_warmup_interval: settings.camera_warmup_interval,
        }
    }

    pub fn video_worker_config(&self) -> VideoWorkerConfig {
        VideoWorkerConfig {
            webcam: self.webcam,
            target_fps: self.fps,
            pacing: self.pacing,
            camera_read_attempts: self.camera_read_attempts,
            ring: self.ring,
            warmup_frames: self.camera_warmup_frames,
            warmup_interval: self.camera_warmup_interval,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_position_falls_back() {
        let request: StartRequest =
            serde_json::from_str(r#"{"webcam_position": "middle"}"#).unwrap();
        assert_eq!(request.webcam_position, Some(WebcamPosition::BottomRight));

        let request: StartRequest =
            serde_json::from_str(r#"{"webcam_position": "top-left"}"#).unwrap();
        assert_eq!(request.webcam_position, Some(WebcamPosition::TopLeft));
    }

    #[test]
    fn test_anchor_per_corner() {
        let (w, h) = (1920, 1080);
        let anchor = |position| WebcamConfig::new(200, position).anchor(w, h);

        assert_eq!(anchor(WebcamPosition::BottomRight), Anchor::new(1690, 850));
        assert_eq!(anchor(WebcamPosition::BottomLeft), Anchor::new(30, 850));
        assert_eq!(anchor(WebcamPosition::TopRight), Anchor::new(1690, 30));
        assert_eq!(anchor(WebcamPosition::TopLeft), Anchor::new(30, 30));
    }

    #[test]
    fn test_anchor_negative_on_tiny_screen() {
        let anchor = WebcamConfig::new(200, WebcamPosition::BottomRight).anchor(100, 100);
        assert!(anchor.x < 0 && anchor.y < 0);
    }

    #[test]
    fn test_request_is_clamped() {
        let settings = RecorderSettings::default();
        let request = StartRequest {
            webcam_size: Some(400),
            fps: Some(60),
            output_name: Some("   ".to_string()),
            ..Default::default()
        };
        let config = SessionConfig::from_request(&settings, &request);
        assert_eq!(config.webcam.size, MAX_WEBCAM_SIZE);
        assert_eq!(config.fps, MAX_FPS);
        assert_eq!(config.output_name, None);
        assert_eq!(config.countdown, Duration::ZERO);

        let config = SessionConfig::from_request(
            &settings,
            &StartRequest {
                webcam_size: Some(0),
                fps: Some(0),
                ..Default::default()
            },
        );
        assert_eq!(config.webcam.size, 1);
        assert_eq!(config.fps, 1);
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            SessionConfig::from_request(&RecorderSettings::default(), &StartRequest::default());
        assert_eq!(config.webcam, WebcamConfig::default());
        assert_eq!(config.fps, DEFAULT_FPS);
        assert!(config.session_id.starts_with("session-"));
    }
}
