//! Capture device providers
//!
//! Workers never construct devices directly; they ask a `DeviceProvider`
//! from inside their own thread, so every handle is owned (and dropped) by
//! the worker that uses it.
//!
//! - `SyntheticDevices`: generated test pattern, camera and silence
//! - `NativeDevices` (feature `native-devices`): xcap, nokhwa and cpal

pub mod synthetic;

#[cfg(feature = "native-devices")]
pub mod native;

use crate::audio::{AudioConfig, AudioInput};
use crate::error::RecorderError;
use crate::video::{CameraBackend, CameraDevice, ScreenSource};

pub use synthetic::SyntheticDevices;

#[cfg(feature = "native-devices")]
pub use native::NativeDevices;

/// Opens the screen, camera and microphone for a session
pub trait DeviceProvider: Send + Sync {
    fn open_screen(&self) -> Result<Box<dyn ScreenSource>, RecorderError>;

    fn open_camera(
        &self,
        index: u32,
        backend: CameraBackend,
    ) -> Result<Box<dyn CameraDevice>, RecorderError>;

    fn open_audio(&self, config: &AudioConfig) -> Result<Box<dyn AudioInput>, RecorderError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
