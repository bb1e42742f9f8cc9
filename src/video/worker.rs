use image::RgbImage;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::compositor::{OverlayCompositor, RingStyle};
use super::frame::FrameBuffer;
use super::mask::CircularMask;
use super::pacing::{Clock, PacingController, PacingDecision, PacingPolicy};
use super::source::{CameraBackend, CameraDevice, ScreenSource, CAMERA_INDICES};
use crate::devices::DeviceProvider;
use crate::session::{StartBarrier, WebcamConfig};

/// Warn once per this many consecutive-or-not camera read failures
const CAMERA_FAILURE_LOG_EVERY: u64 = 60;

/// Warn once per this many screen grab failures
const SCREEN_FAILURE_LOG_EVERY: u64 = 30;

/// Pause between retried camera reads within one iteration
const CAMERA_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Upper bound on camera reads per iteration
pub const MAX_CAMERA_READ_ATTEMPTS: u32 = 3;

/// Configuration for the video half of a session
#[derive(Debug, Clone)]
pub struct VideoWorkerConfig {
    pub webcam: WebcamConfig,
    pub target_fps: u32,
    pub pacing: PacingPolicy,
    /// Camera reads attempted per iteration (clamped to 1..=3)
    pub camera_read_attempts: u32,
    pub ring: RingStyle,
    /// Initial camera frames thrown away after opening
    pub warmup_frames: u32,
    pub warmup_interval: Duration,
    pub camera_indices: Vec<u32>,
    pub camera_backends: Vec<CameraBackend>,
}

impl Default for VideoWorkerConfig {
    fn default() -> Self {
        Self {
            webcam: WebcamConfig::default(),
            target_fps: 20,
            pacing: PacingPolicy::default(),
            camera_read_attempts: 1,
            ring: RingStyle::default(),
            warmup_frames: 10,
            warmup_interval: Duration::from_millis(50),
            camera_indices: CAMERA_INDICES.to_vec(),
            camera_backends: CameraBackend::platform_defaults().to_vec(),
        }
    }
}

/// Summary of one video capture run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureStats {
    pub frames: usize,
    pub webcam_available: bool,
    pub webcam_overlays: u64,
    pub webcam_failures: u64,
    pub screen_failures: u64,
    pub duration_secs: f64,
    pub actual_fps: f64,
}

/// What the video worker hands back when it exits
#[derive(Debug, Default)]
pub struct VideoCapture {
    pub frames: FrameBuffer,
    pub stats: CaptureStats,
    /// Set when the screen could not be opened at all
    pub error: Option<String>,
}

/// Grabs screen frames, overlays the webcam, timestamps and paces them.
///
/// Runs on its own thread until the shared recording flag is cleared. The
/// screen and camera handles live on this thread and are dropped when `run`
/// returns.
pub struct VideoCaptureWorker {
    config: VideoWorkerConfig,
    devices: Arc<dyn DeviceProvider>,
    mask: Arc<CircularMask>,
    recording: Arc<AtomicBool>,
    barrier: Arc<StartBarrier>,
    frame_counter: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl VideoCaptureWorker {
    pub fn new(
        config: VideoWorkerConfig,
        devices: Arc<dyn DeviceProvider>,
        mask: Arc<CircularMask>,
        recording: Arc<AtomicBool>,
        barrier: Arc<StartBarrier>,
        frame_counter: Arc<AtomicUsize>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            devices,
            mask,
            recording,
            barrier,
            frame_counter,
            clock,
        }
    }

    pub fn run(self) -> VideoCapture {
        let mut camera = self.acquire_camera();

        let mut screen = match self.devices.open_screen() {
            Ok(screen) => screen,
            Err(e) => {
                error!("Screen capture unavailable: {}", e);
                // Let audio proceed rather than time out on a session that has no video
                self.barrier.release(self.clock.now());
                return VideoCapture {
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        let started_at = self.clock.now();
        self.barrier.release(started_at);

        let (screen_width, screen_height) = screen.dimensions();
        let anchor = self.config.webcam.anchor(screen_width, screen_height);
        let mut compositor = OverlayCompositor::new(Arc::clone(&self.mask), self.config.ring);

        info!(
            "Recording {} at {}x{} ({} fps target, {:?} pacing)",
            screen.name(),
            screen_width,
            screen_height,
            self.config.target_fps,
            self.config.pacing
        );
        if camera.is_some() {
            info!(
                "Webcam overlay at ({}, {}), size {}px",
                anchor.x, anchor.y, self.config.webcam.size
            );
        }

        let mut pacer =
            PacingController::new(self.config.pacing, self.config.target_fps, started_at);
        let mut frames = FrameBuffer::new();
        let mut stats = CaptureStats {
            webcam_available: camera.is_some(),
            ..Default::default()
        };
        let progress_every = (self.config.target_fps.max(1) as usize) * 2;

        while self.recording.load(Ordering::SeqCst) {
            let iteration_start = self.clock.now();

            if let PacingDecision::Wait(wait) = pacer.before_frame(iteration_start) {
                self.clock.sleep(wait);
                continue;
            }

            let mut frame = match screen.grab() {
                Ok(frame) => frame,
                Err(e) => {
                    stats.screen_failures += 1;
                    if stats.screen_failures % SCREEN_FAILURE_LOG_EVERY == 1 {
                        warn!(
                            "Screen grab failing ({} failures so far): {}",
                            stats.screen_failures, e
                        );
                    }
                    if let Some(wait) = pacer.throttle(iteration_start, self.clock.now()) {
                        self.clock.sleep(wait);
                    }
                    continue;
                }
            };

            if let Some(cam) = camera.as_mut() {
                match self.read_camera(cam.as_mut()) {
                    Some(camera_frame) => {
                        if compositor.composite(&mut frame, &camera_frame, anchor) {
                            stats.webcam_overlays += 1;
                        }
                    }
                    None => {
                        stats.webcam_failures += 1;
                        if stats.webcam_failures % CAMERA_FAILURE_LOG_EVERY == 0 {
                            warn!(
                                "Webcam capture failing ({} failures); recording without overlay",
                                stats.webcam_failures
                            );
                        }
                    }
                }
            }

            let timestamp = iteration_start
                .saturating_duration_since(started_at)
                .as_secs_f64();
            frames.push(frame, timestamp);
            let produced = self.frame_counter.fetch_add(1, Ordering::SeqCst) + 1;

            if produced % progress_every == 0 {
                info!(
                    "Captured {} frames ({} with webcam)",
                    produced, stats.webcam_overlays
                );
            }

            if let Some(wait) = pacer.after_frame(iteration_start, self.clock.now()) {
                self.clock.sleep(wait);
            }
        }

        if let Some(cam) = camera.take() {
            info!("Releasing {}", cam.name());
        }
        drop(screen);

        let duration = self.clock.now().saturating_duration_since(started_at);
        stats.frames = frames.len();
        stats.duration_secs = duration.as_secs_f64();
        stats.actual_fps = if stats.duration_secs > 0.0 {
            stats.frames as f64 / stats.duration_secs
        } else {
            0.0
        };

        info!(
            "Video done: {} frames in {:.2}s ({:.2} fps), {} overlays, {} camera failures",
            stats.frames,
            stats.duration_secs,
            stats.actual_fps,
            stats.webcam_overlays,
            stats.webcam_failures
        );
        if stats.webcam_available && stats.webcam_overlays == 0 && stats.frames > 0 {
            warn!("No webcam overlays were applied during the session");
        }

        VideoCapture {
            frames,
            stats,
            error: None,
        }
    }

    /// Probe camera indices × backends and warm up the first that opens.
    ///
    /// `None` means the session records screen-only.
    fn acquire_camera(&self) -> Option<Box<dyn CameraDevice>> {
        let mut opened = None;
        'probe: for &index in &self.config.camera_indices {
            for &backend in &self.config.camera_backends {
                match self.devices.open_camera(index, backend) {
                    Ok(camera) => {
                        info!("Webcam opened on index {} ({:?})", index, backend);
                        opened = Some(camera);
                        break 'probe;
                    }
                    Err(e) => {
                        info!("No webcam at index {} ({:?}): {}", index, backend, e);
                    }
                }
            }
        }

        let Some(mut camera) = opened else {
            warn!("No webcam available; continuing with screen-only recording");
            return None;
        };

        // The first frames after opening are often black or stale
        for _ in 0..self.config.warmup_frames {
            let _ = camera.read();
            self.clock.sleep(self.config.warmup_interval);
        }

        match camera.read() {
            Ok(frame) if frame.width() > 0 && frame.height() > 0 => {
                info!(
                    "Webcam initialized: {} ({}x{})",
                    camera.name(),
                    frame.width(),
                    frame.height()
                );
                Some(camera)
            }
            Ok(_) => {
                warn!("Webcam returned an empty test frame; continuing without overlay");
                None
            }
            Err(e) => {
                warn!("Webcam not working ({}); continuing without overlay", e);
                None
            }
        }
    }

    fn read_camera(&self, camera: &mut dyn CameraDevice) -> Option<RgbImage> {
        let attempts = self
            .config
            .camera_read_attempts
            .clamp(1, MAX_CAMERA_READ_ATTEMPTS);
        for attempt in 1..=attempts {
            match camera.read() {
                Ok(frame) if frame.width() > 0 && frame.height() > 0 => return Some(frame),
                _ if attempt < attempts => self.clock.sleep(CAMERA_RETRY_BACKOFF),
                _ => {}
            }
        }
        None
    }
}
