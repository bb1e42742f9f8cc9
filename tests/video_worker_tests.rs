// Integration tests for the video capture loop
//
// Scripted devices stop the recording after a fixed number of screen grabs
// and a manual clock makes every pacing sleep instantaneous.

use image::{Rgb, RgbImage};
use screenloom::audio::{AudioConfig, AudioInput};
use screenloom::devices::DeviceProvider;
use screenloom::error::{DeviceKind, RecorderError};
use screenloom::session::{StartBarrier, WebcamConfig, WebcamPosition};
use screenloom::video::{
    CameraBackend, CameraDevice, CircularMask, ManualClock, PacingPolicy, ScreenSource,
    VideoCapture, VideoCaptureWorker, VideoWorkerConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SCREEN_COLOR: Rgb<u8> = Rgb([10, 20, 30]);
const CAMERA_COLOR: Rgb<u8> = Rgb([200, 0, 0]);

/// Solid screen that clears the recording flag on its `stop_after`-th grab
struct ScriptedScreen {
    recording: Arc<AtomicBool>,
    grabs: usize,
    stop_after: usize,
    fail_every: Option<usize>,
}

impl ScreenSource for ScriptedScreen {
    fn dimensions(&self) -> (u32, u32) {
        (64, 48)
    }

    fn grab(&mut self) -> Result<RgbImage, RecorderError> {
        self.grabs += 1;
        if self.grabs >= self.stop_after {
            self.recording.store(false, Ordering::SeqCst);
        }
        if let Some(n) = self.fail_every {
            if self.grabs % n == 0 {
                return Err(RecorderError::transient(DeviceKind::Screen, "scripted failure"));
            }
        }
        Ok(RgbImage::from_pixel(64, 48, SCREEN_COLOR))
    }

    fn name(&self) -> &str {
        "scripted screen"
    }
}

/// Camera that succeeds for `good_reads` reads, then fails
struct ScriptedCamera {
    reads: Arc<AtomicUsize>,
    good_reads: usize,
    released: Arc<AtomicBool>,
}

impl CameraDevice for ScriptedCamera {
    fn read(&mut self) -> Result<RgbImage, RecorderError> {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if reads > self.good_reads {
            return Err(RecorderError::transient(DeviceKind::Camera, "scripted failure"));
        }
        Ok(RgbImage::from_pixel(32, 24, CAMERA_COLOR))
    }

    fn name(&self) -> &str {
        "scripted camera"
    }
}

impl Drop for ScriptedCamera {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct ScriptedDevices {
    recording: Arc<AtomicBool>,
    stop_after: usize,
    fail_every: Option<usize>,
    screen_available: bool,
    /// `None` means no camera opens at any index
    camera_good_reads: Option<usize>,
    camera_released: Arc<AtomicBool>,
    camera_opens: AtomicUsize,
    camera_reads: Arc<AtomicUsize>,
}

impl ScriptedDevices {
    fn new(recording: &Arc<AtomicBool>, stop_after: usize) -> Self {
        Self {
            recording: Arc::clone(recording),
            stop_after,
            fail_every: None,
            screen_available: true,
            camera_good_reads: None,
            camera_released: Arc::new(AtomicBool::new(false)),
            camera_opens: AtomicUsize::new(0),
            camera_reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl DeviceProvider for ScriptedDevices {
    fn open_screen(&self) -> Result<Box<dyn ScreenSource>, RecorderError> {
        if !self.screen_available {
            return Err(RecorderError::unavailable(DeviceKind::Screen, "no display"));
        }
        Ok(Box::new(ScriptedScreen {
            recording: Arc::clone(&self.recording),
            grabs: 0,
            stop_after: self.stop_after,
            fail_every: self.fail_every,
        }))
    }

    fn open_camera(
        &self,
        index: u32,
        _backend: CameraBackend,
    ) -> Result<Box<dyn CameraDevice>, RecorderError> {
        self.camera_opens.fetch_add(1, Ordering::SeqCst);
        match self.camera_good_reads {
            Some(good_reads) if index == 2 => Ok(Box::new(ScriptedCamera {
                reads: Arc::clone(&self.camera_reads),
                good_reads,
                released: Arc::clone(&self.camera_released),
            })),
            _ => Err(RecorderError::unavailable(DeviceKind::Camera, "busy")),
        }
    }

    fn open_audio(&self, _config: &AudioConfig) -> Result<Box<dyn AudioInput>, RecorderError> {
        Err(RecorderError::unavailable(DeviceKind::Audio, "not scripted"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn worker_config(pacing: PacingPolicy) -> VideoWorkerConfig {
    VideoWorkerConfig {
        webcam: WebcamConfig::new(16, WebcamPosition::TopLeft),
        target_fps: 20,
        pacing,
        warmup_frames: 2,
        warmup_interval: Duration::from_millis(50),
        camera_backends: vec![CameraBackend::Auto],
        ..Default::default()
    }
}

struct Run {
    capture: VideoCapture,
    barrier: Arc<StartBarrier>,
    counter: Arc<AtomicUsize>,
}

fn run(devices: Arc<ScriptedDevices>, config: VideoWorkerConfig) -> Run {
    let recording = Arc::clone(&devices.recording);
    recording.store(true, Ordering::SeqCst);
    let barrier = Arc::new(StartBarrier::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let mask = Arc::new(CircularMask::new(config.webcam.size));

    let worker = VideoCaptureWorker::new(
        config,
        devices,
        mask,
        recording,
        Arc::clone(&barrier),
        Arc::clone(&counter),
        Arc::new(ManualClock::new()),
    );
    Run {
        capture: worker.run(),
        barrier,
        counter,
    }
}

fn assert_consistent(capture: &VideoCapture) {
    let timestamps = capture.frames.timestamps();
    assert_eq!(capture.frames.len(), timestamps.len());
    assert!(
        timestamps.windows(2).all(|w| w[0] <= w[1]),
        "timestamps went backwards: {:?}",
        timestamps
    );
}

#[test]
fn test_fixed_delay_paces_frames() {
    let recording = Arc::new(AtomicBool::new(false));
    let devices = Arc::new(ScriptedDevices::new(&recording, 10));

    let Run { capture, barrier, counter } = run(devices, worker_config(PacingPolicy::FixedDelay));

    assert!(capture.error.is_none());
    assert_eq!(capture.frames.len(), 10);
    assert_eq!(counter.load(Ordering::SeqCst), 10);
    assert!(barrier.is_released());
    assert_consistent(&capture);

    // Each iteration sleeps the full 50ms period on the manual clock
    let timestamps = capture.frames.timestamps();
    assert_eq!(timestamps[0], 0.0);
    assert!((timestamps[9] - 0.45).abs() < 1e-6);
    assert!((capture.stats.duration_secs - 0.5).abs() < 1e-6);
}

#[test]
fn test_catch_up_timestamps_non_decreasing() {
    let recording = Arc::new(AtomicBool::new(false));
    let devices = Arc::new(ScriptedDevices::new(&recording, 12));

    let Run { capture, .. } = run(devices, worker_config(PacingPolicy::CatchUp));

    assert_eq!(capture.frames.len(), 12);
    assert_consistent(&capture);
    // Never captures ahead of the schedule
    let timestamps = capture.frames.timestamps();
    for (i, ts) in timestamps.iter().enumerate() {
        assert!(*ts + 1e-9 >= i as f64 / 20.0, "frame {} at {} is early", i, ts);
    }
}

#[test]
fn test_no_camera_frames_are_raw_screen() {
    let recording = Arc::new(AtomicBool::new(false));
    let devices = Arc::new(ScriptedDevices::new(&recording, 5));

    let Run { capture, .. } = run(Arc::clone(&devices), worker_config(PacingPolicy::FixedDelay));

    // Every index was probed once on the single configured backend
    assert_eq!(devices.camera_opens.load(Ordering::SeqCst), 4);
    assert!(!capture.stats.webcam_available);
    assert_eq!(capture.frames.len(), 5);
    let raw = RgbImage::from_pixel(64, 48, SCREEN_COLOR);
    assert!(capture.frames.frames().iter().all(|f| *f == raw));
}

#[test]
fn test_camera_overlay_applied_and_released() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 4);
    devices.camera_good_reads = Some(100);
    let devices = Arc::new(devices);

    let Run { capture, .. } = run(Arc::clone(&devices), worker_config(PacingPolicy::FixedDelay));

    // Indices 0 and 1 fail, index 2 opens
    assert_eq!(devices.camera_opens.load(Ordering::SeqCst), 3);
    assert!(capture.stats.webcam_available);
    assert_eq!(capture.stats.webcam_overlays, 4);
    assert!(devices.camera_released.load(Ordering::SeqCst));

    // Overlay at (30, 30), 16px: centre is camera colour, corner stays screen
    for frame in capture.frames.frames() {
        assert_eq!(*frame.get_pixel(38, 38), CAMERA_COLOR);
        assert_eq!(*frame.get_pixel(30, 30), SCREEN_COLOR);
        assert_eq!(*frame.get_pixel(0, 0), SCREEN_COLOR);
    }
}

#[test]
fn test_camera_failures_fall_back_to_screen() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 6);
    // Two warm-up reads and the test read succeed, then every read fails
    devices.camera_good_reads = Some(3);
    let devices = Arc::new(devices);

    let mut config = worker_config(PacingPolicy::FixedDelay);
    config.camera_read_attempts = 5;
    let Run { capture, .. } = run(Arc::clone(&devices), config);

    assert!(capture.stats.webcam_available);
    assert_eq!(capture.stats.webcam_overlays, 0);
    assert_eq!(capture.stats.webcam_failures, 6);
    assert_eq!(capture.frames.len(), 6);
    // Three startup reads, then at most three reads per frame despite 5 configured
    assert_eq!(devices.camera_reads.load(Ordering::SeqCst), 3 + 6 * 3);
    let raw = RgbImage::from_pixel(64, 48, SCREEN_COLOR);
    assert!(capture.frames.frames().iter().all(|f| *f == raw));
    assert!(devices.camera_released.load(Ordering::SeqCst));
}

#[test]
fn test_single_camera_read_per_frame_by_default() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 4);
    devices.camera_good_reads = Some(3);
    let devices = Arc::new(devices);

    let mut config = worker_config(PacingPolicy::FixedDelay);
    config.camera_read_attempts = 1;
    let Run { capture, .. } = run(Arc::clone(&devices), config);

    assert_eq!(capture.stats.webcam_failures, 4);
    assert_eq!(devices.camera_reads.load(Ordering::SeqCst), 3 + 4);
}

#[test]
fn test_overlay_too_large_is_not_counted() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 5);
    devices.camera_good_reads = Some(100);
    let devices = Arc::new(devices);

    // 100px overlay cannot fit a 64x48 screen
    let mut config = worker_config(PacingPolicy::FixedDelay);
    config.webcam = WebcamConfig::new(100, WebcamPosition::TopLeft);
    let Run { capture, .. } = run(devices, config);

    assert!(capture.stats.webcam_available);
    assert_eq!(capture.stats.webcam_overlays, 0);
    assert_eq!(capture.stats.webcam_failures, 0);
    let raw = RgbImage::from_pixel(64, 48, SCREEN_COLOR);
    assert!(capture.frames.frames().iter().all(|f| *f == raw));
}

#[test]
fn test_failed_test_read_releases_camera() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 3);
    // Warm-up reads succeed, the test read fails
    devices.camera_good_reads = Some(2);
    let devices = Arc::new(devices);

    let Run { capture, .. } = run(Arc::clone(&devices), worker_config(PacingPolicy::FixedDelay));

    assert!(!capture.stats.webcam_available);
    assert!(devices.camera_released.load(Ordering::SeqCst));
    assert_eq!(capture.frames.len(), 3);
}

#[test]
fn test_screen_failures_produce_no_frame() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 9);
    devices.fail_every = Some(3);
    let devices = Arc::new(devices);

    let Run { capture, counter, .. } = run(devices, worker_config(PacingPolicy::FixedDelay));

    // Grabs 3, 6 and 9 fail
    assert_eq!(capture.stats.screen_failures, 3);
    assert_eq!(capture.frames.len(), 6);
    assert_eq!(counter.load(Ordering::SeqCst), 6);
    assert_consistent(&capture);
}

#[test]
fn test_screen_unavailable_releases_barrier() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut devices = ScriptedDevices::new(&recording, 3);
    devices.screen_available = false;
    let devices = Arc::new(devices);

    let Run { capture, barrier, .. } = run(devices, worker_config(PacingPolicy::FixedDelay));

    assert!(capture.error.is_some());
    assert!(capture.frames.is_empty());
    assert!(barrier.is_released());
}
