use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which piece of hardware an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Screen,
    Camera,
    Audio,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Screen => write!(f, "screen"),
            DeviceKind::Camera => write!(f, "camera"),
            DeviceKind::Audio => write!(f, "audio device"),
        }
    }
}

/// Start/stop requests that do not fit the current lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleConflict {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Not recording")]
    NotRecording,

    #[error("Recording is being stopped")]
    Stopping,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    /// A device could not be opened at all
    #[error("{device} unavailable: {reason}")]
    DeviceUnavailable { device: DeviceKind, reason: String },

    /// A single read failed or returned nothing; callers skip and retry
    #[error("transient {device} capture failure: {reason}")]
    TransientCapture { device: DeviceKind, reason: String },

    #[error(transparent)]
    Conflict(#[from] LifecycleConflict),

    /// Muxing or artifact writing failed
    #[error("export failed: {0}")]
    Export(String),

    /// Worker threads could not be spawned
    #[error("failed to launch recording: {0}")]
    Launch(String),
}

impl RecorderError {
    pub fn unavailable(device: DeviceKind, reason: impl fmt::Display) -> Self {
        RecorderError::DeviceUnavailable {
            device,
            reason: reason.to_string(),
        }
    }

    pub fn transient(device: DeviceKind, reason: impl fmt::Display) -> Self {
        RecorderError::TransientCapture {
            device,
            reason: reason.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RecorderError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages() {
        let err: RecorderError = LifecycleConflict::AlreadyRecording.into();
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Already recording");

        let err: RecorderError = LifecycleConflict::NotRecording.into();
        assert_eq!(err.to_string(), "Not recording");
    }

    #[test]
    fn test_device_error_display() {
        let err = RecorderError::unavailable(DeviceKind::Camera, "index 0 busy");
        assert_eq!(err.to_string(), "camera unavailable: index 0 busy");
        assert!(!err.is_conflict());

        let err = RecorderError::transient(DeviceKind::Audio, "read timed out");
        assert_eq!(
            err.to_string(),
            "transient audio device capture failure: read timed out"
        );
    }
}
