pub mod audio;
pub mod config;
pub mod devices;
pub mod error;
pub mod export;
pub mod http;
pub mod session;
pub mod video;

pub use audio::{AudioCapture, AudioCaptureWorker, AudioConfig, AudioInput, AudioStatus};
pub use config::Config;
pub use devices::{DeviceProvider, SyntheticDevices};
pub use error::{DeviceKind, LifecycleConflict, RecorderError};
pub use export::{
    ArtifactPaths, ExportReport, ExportStage, FfmpegMuxer, MuxStatus, Muxer, VideoEncoder,
};
pub use http::{create_router, AppState};
pub use session::{
    RecorderSettings, SessionOrchestrator, SessionState, StartRequest, StatusReport, StopReport,
    WebcamConfig, WebcamPosition,
};
pub use video::{
    CircularMask, CircularMaskCache, FrameBuffer, OverlayCompositor, PacingController,
    PacingPolicy, VideoCapture, VideoCaptureWorker,
};
