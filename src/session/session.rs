use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::barrier::StartBarrier;
use super::config::SessionConfig;
use crate::audio::{AudioCapture, AudioCaptureWorker, AudioStatus};
use crate::devices::DeviceProvider;
use crate::video::{CircularMaskCache, Clock, VideoCapture, VideoCaptureWorker};

/// Countdown is waited in slices so a stop during it is noticed quickly
const COUNTDOWN_SLICE: Duration = Duration::from_millis(100);

/// What the workers handed back, collected at stop
#[derive(Debug)]
pub struct SessionCapture {
    pub video: VideoCapture,
    pub audio: AudioCapture,
    pub audio_status: AudioStatus,
    pub warnings: Vec<String>,
}

/// Handles shared with the worker threads
struct WorkerLinks {
    video_tx: Sender<VideoCapture>,
    audio_tx: Sender<AudioCapture>,
}

/// One recording attempt.
///
/// Created fresh for each accepted start request. Only the recording flag,
/// start barrier and frame counter are shared with the workers; buffers come
/// back through the result channels when the workers exit.
pub struct Session {
    config: SessionConfig,
    recording: Arc<AtomicBool>,
    barrier: Arc<StartBarrier>,
    frame_counter: Arc<AtomicUsize>,
    started_at: DateTime<Local>,
    video_rx: Receiver<VideoCapture>,
    audio_rx: Receiver<AudioCapture>,
    links: Option<WorkerLinks>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let (video_tx, video_rx) = mpsc::channel();
        let (audio_tx, audio_rx) = mpsc::channel();
        Self {
            config,
            recording: Arc::new(AtomicBool::new(false)),
            barrier: Arc::new(StartBarrier::new()),
            frame_counter: Arc::new(AtomicUsize::new(0)),
            started_at: Local::now(),
            video_rx,
            audio_rx,
            links: Some(WorkerLinks { video_tx, audio_tx }),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn frame_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.frame_counter)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_counter.load(Ordering::SeqCst)
    }

    /// Set the recording flag and spawn the launcher thread.
    ///
    /// The launcher waits out the countdown, then spawns the audio and video
    /// workers and calls `on_active`. If recording is stopped during the
    /// countdown no workers are spawned.
    pub fn launch<F>(
        &mut self,
        devices: Arc<dyn DeviceProvider>,
        clock: Arc<dyn Clock>,
        masks: Arc<CircularMaskCache>,
        on_active: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let links = self
            .links
            .take()
            .context("session has already been launched")?;

        self.recording.store(true, Ordering::SeqCst);

        let config = self.config.clone();
        let recording = Arc::clone(&self.recording);
        let barrier = Arc::clone(&self.barrier);
        let frame_counter = Arc::clone(&self.frame_counter);

        let spawned = thread::Builder::new()
            .name("recording-launcher".to_string())
            .spawn(move || {
                if !wait_countdown(config.countdown, &recording) {
                    info!("Recording {} cancelled during countdown", config.session_id);
                    return;
                }

                // Fetched once per session, before the capture loop
                let mask = masks.mask_for(config.webcam.size);

                let audio = AudioCaptureWorker::new(
                    config.audio.clone(),
                    Arc::clone(&devices),
                    Arc::clone(&recording),
                    Arc::clone(&barrier),
                );
                let audio_tx = links.audio_tx;
                if let Err(e) = thread::Builder::new()
                    .name("audio-capture".to_string())
                    .spawn(move || {
                        let _ = audio_tx.send(audio.run());
                    })
                {
                    warn!("Failed to spawn audio capture thread: {}", e);
                }

                let video = VideoCaptureWorker::new(
                    config.video_worker_config(),
                    devices,
                    mask,
                    Arc::clone(&recording),
                    barrier,
                    frame_counter,
                    clock,
                );
                let video_tx = links.video_tx;
                if let Err(e) = thread::Builder::new()
                    .name("video-capture".to_string())
                    .spawn(move || {
                        let _ = video_tx.send(video.run());
                    })
                {
                    warn!("Failed to spawn video capture thread: {}", e);
                }

                info!("Recording {} started", config.session_id);
                on_active();
            });

        if let Err(e) = spawned {
            self.recording.store(false, Ordering::SeqCst);
            return Err(e).context("failed to spawn recording launcher");
        }
        Ok(())
    }

    /// Clear the recording flag; workers exit after their current iteration
    pub fn signal_stop(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }

    /// Wait up to `grace` for each worker and take its buffers.
    ///
    /// A worker that never started, or that misses the grace period,
    /// contributes an empty buffer.
    pub fn collect(self, grace: Duration) -> SessionCapture {
        self.signal_stop();
        let deadline = Instant::now() + grace;
        let mut warnings = Vec::new();

        let video = match self
            .video_rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            Ok(video) => video,
            Err(RecvTimeoutError::Timeout) => {
                let message = format!("video worker did not finish within {:?}", grace);
                warn!("{}", message);
                warnings.push(message);
                VideoCapture::default()
            }
            Err(RecvTimeoutError::Disconnected) => VideoCapture::default(),
        };
        if let Some(error) = &video.error {
            warnings.push(format!("video: {}", error));
        }

        let (audio, audio_status) = match self
            .audio_rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
        {
            Ok(audio) => {
                let status = audio.status();
                (audio, status)
            }
            Err(RecvTimeoutError::Timeout) => {
                let message = format!("audio worker did not finish within {:?}", grace);
                warn!("{}", message);
                warnings.push(message);
                (AudioCapture::default(), AudioStatus::Missing)
            }
            Err(RecvTimeoutError::Disconnected) => (AudioCapture::default(), AudioStatus::Empty),
        };
        if let Some(error) = &audio.error {
            warnings.push(format!("audio: {}", error));
        }

        SessionCapture {
            video,
            audio,
            audio_status,
            warnings,
        }
    }
}

/// Sleep out the countdown; `false` if recording was stopped meanwhile
fn wait_countdown(countdown: Duration, recording: &AtomicBool) -> bool {
    let deadline = Instant::now() + countdown;
    loop {
        if !recording.load(Ordering::SeqCst) {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return true;
        }
        thread::sleep(remaining.min(COUNTDOWN_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_aborts_when_stopped() {
        let recording = AtomicBool::new(false);
        let before = Instant::now();
        assert!(!wait_countdown(Duration::from_secs(5), &recording));
        assert!(before.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_countdown_completes() {
        let recording = AtomicBool::new(true);
        assert!(wait_countdown(Duration::from_millis(30), &recording));
        assert!(wait_countdown(Duration::ZERO, &recording));
    }
}
