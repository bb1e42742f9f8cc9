//! Recording lifecycle
//!
//! `SessionOrchestrator` accepts start/stop requests and owns the current
//! `Session`. A session shares only its recording flag, start barrier and
//! frame counter with the capture workers.

mod barrier;
mod config;
mod orchestrator;
mod session;
mod stats;

pub use barrier::StartBarrier;
pub use config::{
    clamp_fps, clamp_webcam_size, RecorderSettings, SessionConfig, StartRequest, WebcamConfig,
    WebcamPosition, DEFAULT_FPS, DEFAULT_WEBCAM_SIZE, MAX_FPS, MAX_WEBCAM_SIZE, OVERLAY_MARGIN,
};
pub use orchestrator::SessionOrchestrator;
pub use session::{Session, SessionCapture};
pub use stats::{SessionState, Settings, StartResponse, StatusReport, StopReport};
