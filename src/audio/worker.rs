use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::backend::AudioConfig;
use crate::devices::DeviceProvider;
use crate::error::RecorderError;
use crate::session::StartBarrier;

/// How long audio waits for video to be ready before starting anyway
pub const BARRIER_TIMEOUT: Duration = Duration::from_secs(2);

/// Warn once per this many read failures
const READ_FAILURE_LOG_EVERY: u64 = 50;

/// Outcome of audio capture as reported to the caller of stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    Captured,
    /// Device opened but produced nothing before stop
    Empty,
    DeviceUnavailable,
    /// Worker did not report back within the stop grace period
    Missing,
}

/// Audio chunks in capture order plus how capture went
#[derive(Debug, Default)]
pub struct AudioCapture {
    pub chunks: Vec<Vec<u8>>,
    pub read_failures: u64,
    pub barrier_timed_out: bool,
    pub error: Option<String>,
}

impl AudioCapture {
    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    pub fn status(&self) -> AudioStatus {
        if self.error.is_some() && self.chunks.is_empty() {
            AudioStatus::DeviceUnavailable
        } else if self.chunks.is_empty() {
            AudioStatus::Empty
        } else {
            AudioStatus::Captured
        }
    }
}

pub struct AudioCaptureWorker {
    config: AudioConfig,
    devices: Arc<dyn DeviceProvider>,
    recording: Arc<AtomicBool>,
    barrier: Arc<StartBarrier>,
    barrier_timeout: Duration,
}

impl AudioCaptureWorker {
    pub fn new(
        config: AudioConfig,
        devices: Arc<dyn DeviceProvider>,
        recording: Arc<AtomicBool>,
        barrier: Arc<StartBarrier>,
    ) -> Self {
        Self {
            config: config.sanitized(),
            devices,
            recording,
            barrier,
            barrier_timeout: BARRIER_TIMEOUT,
        }
    }

    pub fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        self.barrier_timeout = timeout;
        self
    }

    /// Capture until the recording flag clears.
    ///
    /// The device is opened after the start barrier and dropped before
    /// returning, on every path.
    pub fn run(self) -> AudioCapture {
        let mut capture = AudioCapture::default();

        if self.barrier.wait(self.barrier_timeout).is_none() {
            warn!(
                "Video not ready after {:?}; starting audio anyway",
                self.barrier_timeout
            );
            capture.barrier_timed_out = true;
        }

        if !self.recording.load(Ordering::SeqCst) {
            info!("Recording stopped before audio started");
            return capture;
        }

        let mut input = match self.devices.open_audio(&self.config) {
            Ok(input) => input,
            Err(e) => {
                error!("Audio capture unavailable: {}", e);
                capture.error = Some(e.to_string());
                return capture;
            }
        };

        info!(
            "Audio recording from {} ({}Hz, {} channels, {} frames per chunk)",
            input.name(),
            self.config.sample_rate,
            self.config.channels,
            self.config.chunk_size
        );

        let started = Instant::now();
        while self.recording.load(Ordering::SeqCst) {
            match input.read_chunk() {
                Ok(chunk) => capture.chunks.push(chunk),
                Err(RecorderError::DeviceUnavailable { reason, .. }) => {
                    error!("Audio device lost: {}", reason);
                    capture.error = Some(reason);
                    break;
                }
                Err(e) => {
                    capture.read_failures += 1;
                    if capture.read_failures % READ_FAILURE_LOG_EVERY == 1 {
                        warn!(
                            "Audio read failing ({} failures so far): {}",
                            capture.read_failures, e
                        );
                    }
                }
            }
        }
        drop(input);

        info!(
            "Audio capture complete: {} chunks ({:.2}s of audio) in {:.2}s",
            capture.chunks.len(),
            self.config.duration_of(capture.total_bytes()).as_secs_f64(),
            started.elapsed().as_secs_f64()
        );

        capture
    }
}
