// Hardware devices: xcap for the primary monitor, nokhwa for the webcam,
// cpal for the default microphone.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TrySendError};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use xcap::Monitor;

use super::DeviceProvider;
use crate::audio::{AudioConfig, AudioInput};
use crate::error::{DeviceKind, RecorderError};
use crate::video::{CameraBackend, CameraDevice, ScreenSource};

/// Chunks buffered between the cpal callback and the audio worker
const AUDIO_QUEUE_DEPTH: usize = 64;

/// Longest a read waits for the device before reporting a transient failure
const AUDIO_READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct NativeDevices;

impl NativeDevices {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceProvider for NativeDevices {
    fn open_screen(&self) -> Result<Box<dyn ScreenSource>, RecorderError> {
        Ok(Box::new(MonitorScreen::primary()?))
    }

    fn open_camera(
        &self,
        index: u32,
        backend: CameraBackend,
    ) -> Result<Box<dyn CameraDevice>, RecorderError> {
        Ok(Box::new(Webcam::open(index, backend)?))
    }

    fn open_audio(&self, config: &AudioConfig) -> Result<Box<dyn AudioInput>, RecorderError> {
        Ok(Box::new(Microphone::open(config)?))
    }

    fn name(&self) -> &str {
        "native"
    }
}

pub struct MonitorScreen {
    monitor: Monitor,
    name: String,
    width: u32,
    height: u32,
}

impl MonitorScreen {
    /// The primary monitor, or the first one listed
    pub fn primary() -> Result<Self, RecorderError> {
        let monitors =
            Monitor::all().map_err(|e| RecorderError::unavailable(DeviceKind::Screen, e))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .cloned()
            .ok_or_else(|| RecorderError::unavailable(DeviceKind::Screen, "no monitors found"))?;

        let name = monitor.name().to_string();
        let (width, height) = (monitor.width(), monitor.height());
        info!("Capturing monitor {} ({}x{})", name, width, height);

        Ok(Self {
            monitor,
            name,
            width,
            height,
        })
    }
}

impl ScreenSource for MonitorScreen {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<RgbImage, RecorderError> {
        let rgba = self
            .monitor
            .capture_image()
            .map_err(|e| RecorderError::transient(DeviceKind::Screen, e))?;
        let (width, height) = (rgba.width(), rgba.height());

        let rgb: Vec<u8> = rgba
            .into_raw()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
            RecorderError::transient(DeviceKind::Screen, "frame buffer size mismatch")
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub struct Webcam {
    camera: Camera,
    name: String,
}

impl Webcam {
    pub fn open(index: u32, backend: CameraBackend) -> Result<Self, RecorderError> {
        let api = match backend {
            CameraBackend::Auto => ApiBackend::Auto,
            CameraBackend::MediaFoundation => ApiBackend::MediaFoundation,
            CameraBackend::AVFoundation => ApiBackend::AVFoundation,
            CameraBackend::Video4Linux => ApiBackend::Video4Linux,
        };
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(Resolution::new(640, 480), FrameFormat::MJPEG, 30),
        ));

        let mut camera = Camera::with_backend(CameraIndex::Index(index), requested, api)
            .map_err(|e| RecorderError::unavailable(DeviceKind::Camera, e))?;
        camera
            .open_stream()
            .map_err(|e| RecorderError::unavailable(DeviceKind::Camera, e))?;

        let name = format!("{} (index {})", camera.info().human_name(), index);
        Ok(Self { camera, name })
    }
}

impl CameraDevice for Webcam {
    fn read(&mut self) -> Result<RgbImage, RecorderError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| RecorderError::transient(DeviceKind::Camera, e))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| RecorderError::transient(DeviceKind::Camera, e))?;
        let (width, height) = (decoded.width(), decoded.height());
        RgbImage::from_raw(width, height, decoded.into_raw())
            .filter(|frame| frame.width() > 0 && frame.height() > 0)
            .ok_or_else(|| RecorderError::transient(DeviceKind::Camera, "empty frame"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop webcam stream: {}", e);
        }
    }
}

pub struct Microphone {
    // Dropping the stream closes the device
    _stream: cpal::Stream,
    samples: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    samples_per_chunk: usize,
    dropped: Arc<AtomicU64>,
    name: String,
}

impl Microphone {
    pub fn open(config: &AudioConfig) -> Result<Self, RecorderError> {
        let unavailable =
            |e: &dyn std::fmt::Display| RecorderError::unavailable(DeviceKind::Audio, e);

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| unavailable(&"no default input device"))?;
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string());
        let sample_format = device
            .default_input_config()
            .map_err(|e| unavailable(&e))?
            .sample_format();

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<i16>>(AUDIO_QUEUE_DEPTH);
        let dropped = Arc::new(AtomicU64::new(0));
        let err_fn = |err| warn!("Audio stream error: {}", err);

        // Overflow drops the newest block instead of blocking the device callback
        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let dropped = Arc::clone(&dropped);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        let block: Vec<i16> = data
                            .iter()
                            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        if let Err(TrySendError::Full(_)) = tx.try_send(block) {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let dropped = Arc::clone(&dropped);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        if let Err(TrySendError::Full(_)) = tx.try_send(data.to_vec()) {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(unavailable(&format!("unsupported sample format: {:?}", other)));
            }
        }
        .map_err(|e| unavailable(&e))?;

        stream.play().map_err(|e| unavailable(&e))?;
        info!("Microphone opened: {}", name);

        Ok(Self {
            _stream: stream,
            samples: rx,
            pending: Vec::new(),
            samples_per_chunk: config.chunk_size * config.channels as usize,
            dropped,
            name,
        })
    }
}

impl AudioInput for Microphone {
    fn read_chunk(&mut self) -> Result<Vec<u8>, RecorderError> {
        while self.pending.len() < self.samples_per_chunk {
            match self.samples.recv_timeout(AUDIO_READ_TIMEOUT) {
                Ok(block) => self.pending.extend_from_slice(&block),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(RecorderError::transient(
                        DeviceKind::Audio,
                        "no samples within read timeout",
                    ));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(RecorderError::unavailable(
                        DeviceKind::Audio,
                        "input stream closed",
                    ));
                }
            }
        }

        let rest = self.pending.split_off(self.samples_per_chunk);
        let chunk = std::mem::replace(&mut self.pending, rest);
        Ok(chunk.iter().flat_map(|s| s.to_le_bytes()).collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            info!("Audio input overflowed {} times (blocks discarded)", dropped);
        }
    }
}
