//! Screen capture and webcam compositing
//!
//! - `mask`: circular overlay masks, cached per size
//! - `compositor`: crop, resize, mask, ring and blit
//! - `pacing`: frame-rate control against a `Clock`
//! - `frame`: frames paired with their timestamps
//! - `worker`: the capture loop

pub mod compositor;
pub mod frame;
pub mod mask;
pub mod pacing;
pub mod source;
pub mod worker;

pub use compositor::{Anchor, OverlayCompositor, RingStyle, ShadowStyle};
pub use frame::FrameBuffer;
pub use mask::{CircularMask, CircularMaskCache};
pub use pacing::{Clock, ManualClock, PacingController, PacingDecision, PacingPolicy, SystemClock};
pub use source::{CameraBackend, CameraDevice, ScreenSource, CAMERA_INDICES};
pub use worker::{CaptureStats, VideoCapture, VideoCaptureWorker, VideoWorkerConfig};
