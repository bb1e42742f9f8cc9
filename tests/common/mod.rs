// Stand-ins for ffmpeg shared by the integration tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use image::RgbImage;
use screenloom::audio::AudioConfig;
use screenloom::devices::SyntheticDevices;
use screenloom::export::{ExportStage, Muxer, VideoEncoder};
use screenloom::session::{RecorderSettings, SessionOrchestrator};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records what it was asked to encode and writes a placeholder file
#[derive(Default)]
pub struct RecordingEncoder {
    pub calls: Mutex<Vec<(usize, f64, PathBuf)>>,
    pub frames: Mutex<Vec<RgbImage>>,
    pub fail: bool,
}

impl RecordingEncoder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl VideoEncoder for RecordingEncoder {
    fn encode(&self, frames: &[RgbImage], fps: f64, path: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((frames.len(), fps, path.to_path_buf()));
        if self.fail {
            bail!("encoder disabled");
        }
        *self.frames.lock().unwrap() = frames.to_vec();
        std::fs::write(path, b"video")?;
        Ok(())
    }
}

/// Writes the output file on success, or fails every call
#[derive(Default)]
pub struct RecordingMuxer {
    pub calls: Mutex<Vec<(PathBuf, PathBuf, f64, PathBuf)>>,
    pub fail: bool,
}

impl RecordingMuxer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl Muxer for RecordingMuxer {
    fn mux(&self, video: &Path, audio: &Path, audio_offset: f64, output: &Path) -> Result<PathBuf> {
        self.calls.lock().unwrap().push((
            video.to_path_buf(),
            audio.to_path_buf(),
            audio_offset,
            output.to_path_buf(),
        ));
        if self.fail {
            bail!("muxer exited with status 1");
        }
        std::fs::write(output, b"muxed")?;
        Ok(output.to_path_buf())
    }
}

/// Fast settings: no camera warm-up, 10ms audio chunks
pub fn test_settings(output_dir: &Path) -> RecorderSettings {
    RecorderSettings {
        output_dir: output_dir.to_path_buf(),
        audio: AudioConfig {
            sample_rate: 8000,
            channels: 1,
            chunk_size: 80,
            ..Default::default()
        },
        stop_grace: Duration::from_secs(3),
        camera_warmup_frames: 0,
        camera_warmup_interval: Duration::ZERO,
        ..Default::default()
    }
}

pub struct Harness {
    pub recorder: SessionOrchestrator,
    pub encoder: Arc<RecordingEncoder>,
    pub muxer: Arc<RecordingMuxer>,
}

pub fn harness(output_dir: &Path, devices: SyntheticDevices) -> Harness {
    let encoder = Arc::new(RecordingEncoder::default());
    let muxer = Arc::new(RecordingMuxer::default());
    let exporter = ExportStage::new(encoder.clone(), muxer.clone());
    let recorder = SessionOrchestrator::new(test_settings(output_dir), Arc::new(devices), exporter);
    Harness {
        recorder,
        encoder,
        muxer,
    }
}
