use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

use super::config::{RecorderSettings, SessionConfig, StartRequest, WebcamConfig};
use super::session::Session;
use super::stats::{SessionState, Settings, StartResponse, StatusReport, StopReport};
use crate::devices::DeviceProvider;
use crate::error::{LifecycleConflict, RecorderError};
use crate::export::{ArtifactPaths, ExportStage};
use crate::video::{CircularMaskCache, Clock, SystemClock};

struct Inner {
    state: SessionState,
    session: Option<Session>,
    /// Counter of the current (or most recent) session
    frame_counter: Arc<AtomicUsize>,
    /// Webcam and fps of the most recent start request
    applied: (WebcamConfig, u32),
}

/// Owns the recording lifecycle: Idle → Starting → Active → Stopping → Idle.
///
/// Held by the HTTP state; all methods take `&self` and are safe to call
/// from any thread. `stop` blocks until export has finished.
pub struct SessionOrchestrator {
    settings: RecorderSettings,
    devices: Arc<dyn DeviceProvider>,
    exporter: ExportStage,
    clock: Arc<dyn Clock>,
    masks: Arc<CircularMaskCache>,
    inner: Arc<Mutex<Inner>>,
}

impl SessionOrchestrator {
    pub fn new(
        settings: RecorderSettings,
        devices: Arc<dyn DeviceProvider>,
        exporter: ExportStage,
    ) -> Self {
        let applied = (settings.webcam, settings.fps);
        Self {
            settings,
            devices,
            exporter,
            clock: Arc::new(SystemClock),
            masks: Arc::new(CircularMaskCache::new()),
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                session: None,
                frame_counter: Arc::new(AtomicUsize::new(0)),
                applied,
            })),
        }
    }

    /// Drive the video worker from a different clock (tests)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn start(&self, request: StartRequest) -> Result<StartResponse, RecorderError> {
        let mut inner = self.lock();
        match inner.state {
            SessionState::Idle => {}
            SessionState::Stopping => return Err(LifecycleConflict::Stopping.into()),
            SessionState::Starting | SessionState::Active => {
                return Err(LifecycleConflict::AlreadyRecording.into())
            }
        }

        let config = SessionConfig::from_request(&self.settings, &request);
        let mut session = Session::new(config.clone());

        let shared = Arc::clone(&self.inner);
        let session_id = config.session_id.clone();
        let on_active = move || {
            let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
            let current = inner
                .session
                .as_ref()
                .is_some_and(|s| s.id() == session_id && s.is_recording());
            if inner.state == SessionState::Starting && current {
                inner.state = SessionState::Active;
            }
        };

        // The launcher may call back before we store the session, so hold the lock
        session
            .launch(
                Arc::clone(&self.devices),
                Arc::clone(&self.clock),
                Arc::clone(&self.masks),
                on_active,
            )
            .map_err(|e| RecorderError::Launch(format!("{:#}", e)))?;

        info!(
            "Recording {} accepted: webcam {}px {}, {} fps, countdown {:?}",
            config.session_id,
            config.webcam.size,
            config.webcam.position,
            config.fps,
            config.countdown
        );

        inner.state = SessionState::Starting;
        inner.frame_counter = session.frame_counter();
        inner.applied = (config.webcam, config.fps);
        inner.session = Some(session);

        Ok(StartResponse {
            status: "recording".to_string(),
            session_id: config.session_id,
            countdown: config.countdown.as_secs() as u32,
            webcam_size: config.webcam.size,
            webcam_position: config.webcam.position,
            fps: config.fps,
        })
    }

    /// Stop the session, collect the workers' buffers and export.
    ///
    /// Blocks for up to the stop grace period plus the export time.
    pub fn stop(&self) -> Result<StopReport, RecorderError> {
        let session = {
            let mut inner = self.lock();
            match inner.state {
                SessionState::Starting | SessionState::Active => {}
                SessionState::Stopping => return Err(LifecycleConflict::Stopping.into()),
                SessionState::Idle => return Err(LifecycleConflict::NotRecording.into()),
            }
            let Some(session) = inner.session.take() else {
                inner.state = SessionState::Idle;
                return Err(LifecycleConflict::NotRecording.into());
            };
            session.signal_stop();
            inner.state = SessionState::Stopping;
            session
        };

        let session_id = session.id().to_string();
        info!("Stopping recording {}", session_id);

        let target_fps = session.config().fps;
        let audio_config = session.config().audio.clone();
        let paths = ArtifactPaths::new(
            &session.config().output_dir,
            session.config().output_name.as_deref(),
        );

        let capture = session.collect(self.settings.stop_grace);
        let mut warnings = capture.warnings;
        let stats = capture.video.stats.clone();
        let audio_chunks = capture.audio.chunks.len();

        let export = self.exporter.export(
            capture.video.frames,
            capture.audio.chunks,
            &audio_config,
            target_fps,
            &paths,
        );
        warnings.extend(export.errors.iter().cloned());

        match &export.file {
            Some(file) => info!("Recording {} saved to {}", session_id, file.display()),
            None if export.frame_count == 0 => warn!("Recording {} produced no frames", session_id),
            None => error!("Recording {} produced no artifact", session_id),
        }

        self.lock().state = SessionState::Idle;

        Ok(StopReport {
            status: "stopped".to_string(),
            session_id,
            file: export.file,
            frame_count: export.frame_count,
            output_fps: export.output_fps,
            mux_status: export.mux_status,
            audio_status: capture.audio_status,
            audio_chunks,
            capture: stats,
            warnings,
        })
    }

    pub fn status(&self) -> StatusReport {
        let inner = self.lock();
        let recording = inner
            .session
            .as_ref()
            .is_some_and(|s| s.is_recording());
        StatusReport {
            recording,
            state: inner.state,
            frame_count: inner.frame_counter.load(Ordering::SeqCst),
            output_dir: self.output_dir(),
            session_id: inner.session.as_ref().map(|s| s.id().to_string()),
            started_at: inner.session.as_ref().map(|s| s.started_at()),
        }
    }

    pub fn settings(&self) -> Settings {
        let (webcam, fps) = self.lock().applied;
        Settings {
            webcam_size: webcam.size,
            webcam_position: webcam.position,
            fps,
            audio: self.settings.audio.clone(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.settings.output_dir.clone()
    }
}
