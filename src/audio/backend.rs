use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::RecorderError;

/// PCM sample encoding delivered by the capture device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit little-endian, interleaved
    #[default]
    I16,
}

impl SampleFormat {
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            SampleFormat::I16 => 16,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample() as usize / 8
    }
}

/// Audio capture parameters, fixed for the duration of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_format: SampleFormat,
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Frames (samples per channel) returned by each read
    pub chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::I16,
            channels: 2,
            sample_rate: 44100,
            chunk_size: 1024,
        }
    }
}

impl AudioConfig {
    /// Replace zero channels, sample rate or chunk size with the defaults.
    ///
    /// A zero-sized chunk makes every read return immediately with no data.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut config = self;
        if config.channels == 0 {
            warn!("audio.channels is 0; using {}", defaults.channels);
            config.channels = defaults.channels;
        }
        if config.sample_rate == 0 {
            warn!("audio.sample_rate is 0; using {}", defaults.sample_rate);
            config.sample_rate = defaults.sample_rate;
        }
        if config.chunk_size == 0 {
            warn!("audio.chunk_size is 0; using {}", defaults.chunk_size);
            config.chunk_size = defaults.chunk_size;
        }
        config
    }

    /// Size in bytes of one full chunk
    pub fn bytes_per_chunk(&self) -> usize {
        self.chunk_size * self.channels as usize * self.sample_format.bytes_per_sample()
    }

    /// Wall-clock length of one chunk
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_secs_f64(self.chunk_size as f64 / self.sample_rate.max(1) as f64)
    }

    /// Duration covered by `bytes` of captured PCM
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let frame_bytes = self.channels as usize * self.sample_format.bytes_per_sample();
        if frame_bytes == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((bytes / frame_bytes) as f64 / self.sample_rate as f64)
    }
}

/// Blocking audio capture device.
///
/// Implementations open the device on construction and close it on drop.
/// Device overflow is absorbed by the implementation and never reported
/// as an error.
pub trait AudioInput {
    /// Block until one chunk of `chunk_size` frames is available
    fn read_chunk(&mut self) -> Result<Vec<u8>, RecorderError>;

    /// Device name for logging
    fn name(&self) -> &str;
}
