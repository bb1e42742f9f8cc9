use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One-shot gate between the video and audio workers.
///
/// The video worker releases it once its devices are ready, carrying the
/// session start instant. The audio worker waits on it with a timeout before
/// opening its device. Later releases are ignored.
#[derive(Debug, Default)]
pub struct StartBarrier {
    started_at: Mutex<Option<Instant>>,
    ready: Condvar,
}

impl StartBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate. Returns `false` if it was already open.
    pub fn release(&self, at: Instant) -> bool {
        let mut started_at = self.started_at.lock().unwrap_or_else(|e| e.into_inner());
        if started_at.is_some() {
            return false;
        }
        *started_at = Some(at);
        self.ready.notify_all();
        true
    }

    /// Wait up to `timeout` for the gate; `None` means it timed out
    pub fn wait(&self, timeout: Duration) -> Option<Instant> {
        let started_at = self.started_at.lock().unwrap_or_else(|e| e.into_inner());
        let (started_at, _) = self
            .ready
            .wait_timeout_while(started_at, timeout, |s| s.is_none())
            .unwrap_or_else(|e| e.into_inner());
        *started_at
    }

    pub fn started_at(&self) -> Option<Instant> {
        *self.started_at.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_released(&self) -> bool {
        self.started_at().is_some()
    }
}
