use image::RgbImage;
use serde::Serialize;

use crate::error::RecorderError;

/// Full-screen frame grabber.
///
/// Owned by the video worker for the whole session and released on drop.
pub trait ScreenSource {
    /// Native `(width, height)` of grabbed frames
    fn dimensions(&self) -> (u32, u32);

    /// Grab one frame
    fn grab(&mut self) -> Result<RgbImage, RecorderError>;

    fn name(&self) -> &str;
}

/// Webcam handle.
///
/// Owned by the video worker and released on drop, whichever way the worker
/// exits.
pub trait CameraDevice {
    /// Read one frame; an empty or failed read is a transient error
    fn read(&mut self) -> Result<RgbImage, RecorderError>;

    fn name(&self) -> &str;
}

/// Platform capture API used to open a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    /// Let the capture library pick
    Auto,
    MediaFoundation,
    AVFoundation,
    Video4Linux,
}

impl CameraBackend {
    /// Backends tried, in order, on the current platform
    pub fn platform_defaults() -> &'static [CameraBackend] {
        #[cfg(target_os = "windows")]
        {
            &[CameraBackend::MediaFoundation]
        }
        #[cfg(target_os = "macos")]
        {
            &[CameraBackend::AVFoundation]
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            &[CameraBackend::Auto]
        }
    }
}

/// Camera indices probed when opening the webcam
pub const CAMERA_INDICES: [u32; 4] = [0, 1, 2, 3];
