// Generated devices for running the pipeline without hardware
//
// The screen is a gradient with a moving bar, the camera a solid colour that
// cycles per frame, and the microphone produces silence at the configured
// real-time rate.

use image::{Rgb, RgbImage};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use super::DeviceProvider;
use crate::audio::{AudioConfig, AudioInput};
use crate::error::{DeviceKind, RecorderError};
use crate::video::{CameraBackend, CameraDevice, ScreenSource};

#[derive(Debug, Clone)]
pub struct SyntheticDevices {
    screen_size: (u32, u32),
    camera_size: Option<(u32, u32)>,
    audio_enabled: bool,
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self {
            screen_size: (1280, 720),
            camera_size: Some((640, 480)),
            audio_enabled: true,
        }
    }
}

impl SyntheticDevices {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen_size: (width, height),
            ..Default::default()
        }
    }

    pub fn with_camera(mut self, width: u32, height: u32) -> Self {
        self.camera_size = Some((width, height));
        self
    }

    pub fn without_camera(mut self) -> Self {
        self.camera_size = None;
        self
    }

    pub fn without_audio(mut self) -> Self {
        self.audio_enabled = false;
        self
    }
}

impl DeviceProvider for SyntheticDevices {
    fn open_screen(&self) -> Result<Box<dyn ScreenSource>, RecorderError> {
        let (width, height) = self.screen_size;
        if width == 0 || height == 0 {
            return Err(RecorderError::unavailable(
                DeviceKind::Screen,
                "synthetic screen has zero size",
            ));
        }
        Ok(Box::new(SyntheticScreen::new(width, height)))
    }

    fn open_camera(
        &self,
        index: u32,
        _backend: CameraBackend,
    ) -> Result<Box<dyn CameraDevice>, RecorderError> {
        match self.camera_size {
            Some((width, height)) if index == 0 => {
                Ok(Box::new(SyntheticCamera::new(width, height)))
            }
            _ => Err(RecorderError::unavailable(
                DeviceKind::Camera,
                format!("no synthetic camera at index {}", index),
            )),
        }
    }

    fn open_audio(&self, config: &AudioConfig) -> Result<Box<dyn AudioInput>, RecorderError> {
        if !self.audio_enabled {
            return Err(RecorderError::unavailable(
                DeviceKind::Audio,
                "synthetic audio disabled",
            ));
        }
        Ok(Box::new(SyntheticMicrophone::new(config.clone())))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Gradient test pattern with a vertical bar that moves every frame
pub struct SyntheticScreen {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl SyntheticScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
        }
    }

    /// The frame produced at position `frame_index` of the sequence
    pub fn pattern(width: u32, height: u32, frame_index: u64) -> RgbImage {
        let bar_x = if width == 0 {
            0
        } else {
            ((frame_index * 8) % width as u64) as u32
        };
        RgbImage::from_fn(width, height, |x, y| {
            if x >= bar_x && x < bar_x + 4 {
                Rgb([255, 255, 0])
            } else {
                let r = (x * 255 / width.max(1)) as u8;
                let g = (y * 255 / height.max(1)) as u8;
                Rgb([r, g, 96])
            }
        })
    }
}

impl ScreenSource for SyntheticScreen {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn grab(&mut self) -> Result<RgbImage, RecorderError> {
        let frame = Self::pattern(self.width, self.height, self.frame_index);
        self.frame_index += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "synthetic screen"
    }
}

/// Solid colour frames cycling through red, green and blue
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_index: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
        }
    }
}

impl CameraDevice for SyntheticCamera {
    fn read(&mut self) -> Result<RgbImage, RecorderError> {
        let color = match self.frame_index % 3 {
            0 => Rgb([220, 40, 40]),
            1 => Rgb([40, 220, 40]),
            _ => Rgb([40, 40, 220]),
        };
        self.frame_index += 1;
        Ok(RgbImage::from_pixel(self.width, self.height, color))
    }

    fn name(&self) -> &str {
        "synthetic camera"
    }
}

/// Silence delivered at the pace a real device would deliver it
pub struct SyntheticMicrophone {
    config: AudioConfig,
    next_chunk_at: Instant,
}

impl SyntheticMicrophone {
    pub fn new(config: AudioConfig) -> Self {
        info!(
            "Synthetic microphone opened ({}Hz, {} channels)",
            config.sample_rate, config.channels
        );
        Self {
            config,
            next_chunk_at: Instant::now(),
        }
    }
}

impl AudioInput for SyntheticMicrophone {
    fn read_chunk(&mut self) -> Result<Vec<u8>, RecorderError> {
        self.next_chunk_at += self.config.chunk_duration();
        let now = Instant::now();
        if self.next_chunk_at > now {
            thread::sleep(self.next_chunk_at - now);
        } else if now - self.next_chunk_at > Duration::from_secs(1) {
            // Fell far behind (e.g. a suspended process): resync instead of bursting
            self.next_chunk_at = now;
        }
        Ok(vec![0u8; self.config.bytes_per_chunk()])
    }

    fn name(&self) -> &str {
        "synthetic microphone"
    }
}
