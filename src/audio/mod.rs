//! Microphone capture
//!
//! `AudioInput` is the blocking device seam; `AudioCaptureWorker` drives it
//! on its own thread and returns the ordered PCM chunks when recording stops.

pub mod backend;
pub mod worker;

pub use backend::{AudioConfig, AudioInput, SampleFormat};
pub use worker::{AudioCapture, AudioCaptureWorker, AudioStatus, BARRIER_TIMEOUT};
