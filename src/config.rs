use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::AudioConfig;
use crate::session::{
    clamp_fps, clamp_webcam_size, RecorderSettings, WebcamConfig, WebcamPosition, DEFAULT_FPS,
    DEFAULT_WEBCAM_SIZE,
};
use crate::video::{PacingPolicy, RingStyle};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub audio: AudioConfig,
    pub ffmpeg: FfmpegConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "screenloom".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Falls back to `~/Desktop/LoomRecordings` or `./Recordings`
    pub output_dir: Option<String>,
    pub fps: u32,
    pub webcam_size: u32,
    pub webcam_position: WebcamPosition,
    pub pacing: PacingPolicy,
    pub camera_read_attempts: u32,
    pub ring_shadow: bool,
    pub stop_grace_ms: u64,
    pub camera_warmup_frames: u32,
    pub camera_warmup_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            fps: DEFAULT_FPS,
            webcam_size: DEFAULT_WEBCAM_SIZE,
            webcam_position: WebcamPosition::default(),
            pacing: PacingPolicy::default(),
            camera_read_attempts: 1,
            ring_shadow: false,
            stop_grace_ms: 3000,
            camera_warmup_frames: 10,
            camera_warmup_interval_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary: String,
    pub mux_timeout_secs: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            mux_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load `path` (any format the `config` crate knows, extension optional)
    /// layered under `SCREENLOOM__*` environment variables. A missing file
    /// leaves every field at its default.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("SCREENLOOM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn output_dir(&self) -> PathBuf {
        match &self.recording.output_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => default_output_dir(),
        }
    }

    pub fn recorder_settings(&self) -> RecorderSettings {
        let recording = &self.recording;
        RecorderSettings {
            output_dir: self.output_dir(),
            webcam: WebcamConfig::new(
                clamp_webcam_size(recording.webcam_size),
                recording.webcam_position,
            ),
            fps: clamp_fps(recording.fps),
            pacing: recording.pacing,
            camera_read_attempts: recording.camera_read_attempts,
            ring: if recording.ring_shadow {
                RingStyle::with_shadow()
            } else {
                RingStyle::default()
            },
            audio: self.audio.clone().sanitized(),
            stop_grace: Duration::from_millis(recording.stop_grace_ms),
            camera_warmup_frames: recording.camera_warmup_frames,
            camera_warmup_interval: Duration::from_millis(recording.camera_warmup_interval_ms),
        }
    }
}

/// `~/Desktop/LoomRecordings` when a Desktop folder exists, else `./Recordings`
pub fn default_output_dir() -> PathBuf {
    let desktop = PathBuf::from(shellexpand::tilde("~/Desktop").into_owned());
    output_dir_under(&desktop)
}

fn output_dir_under(desktop: &Path) -> PathBuf {
    if desktop.is_dir() {
        desktop.join("LoomRecordings")
    } else {
        PathBuf::from("Recordings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() -> Result<()> {
        let config = Config::load("config/does-not-exist")?;
        assert_eq!(config.service.http.port, 5000);
        assert_eq!(config.recording.fps, 20);
        assert_eq!(config.recording.webcam_size, 200);
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.ffmpeg.mux_timeout_secs, 60);
        Ok(())
    }

    #[test]
    fn test_load_toml() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("screenloom.toml");
        std::fs::write(
            &path,
            r#"
[recording]
output_dir = "/tmp/loom"
fps = 60
webcam_size = 300
webcam_position = "top-left"
pacing = "catch-up"

[audio]
sample_rate = 48000
channels = 1
"#,
        )?;

        let config = Config::load(path.to_str().unwrap())?;
        let settings = config.recorder_settings();
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/loom"));
        assert_eq!(settings.fps, 20);
        assert_eq!(settings.webcam.size, 250);
        assert_eq!(settings.webcam.position, WebcamPosition::TopLeft);
        assert_eq!(settings.pacing, PacingPolicy::CatchUp);
        assert_eq!(settings.audio.sample_rate, 48000);
        assert_eq!(settings.audio.channels, 1);
        assert_eq!(settings.audio.chunk_size, 1024);
        Ok(())
    }

    #[test]
    fn test_zero_audio_section_uses_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("screenloom.toml");
        std::fs::write(
            &path,
            r#"
[audio]
chunk_size = 0
channels = 0
sample_rate = 0
"#,
        )?;

        let settings = Config::load(path.to_str().unwrap())?.recorder_settings();
        assert_eq!(settings.audio, AudioConfig::default());
        assert_eq!(settings.audio.bytes_per_chunk(), 4096);
        Ok(())
    }

    #[test]
    fn test_output_dir_fallback() -> Result<()> {
        let dir = TempDir::new()?;
        assert_eq!(output_dir_under(dir.path()), dir.path().join("LoomRecordings"));
        assert_eq!(
            output_dir_under(&dir.path().join("missing")),
            PathBuf::from("Recordings")
        );
        Ok(())
    }
}
