// Frame pacing for the video capture loop
//
// Two policies are supported:
// - FixedDelay: capture every iteration, then sleep whatever is left of the
//   frame period. Under load the loop simply runs slower; nothing is dropped.
// - CatchUp: only capture while behind the schedule
//   `floor(elapsed * fps)`, otherwise wait for the next slot.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Source of time for the capture loop
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant::now` and `thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Clock that only moves when slept on or advanced explicitly
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacingPolicy {
    #[default]
    FixedDelay,
    CatchUp,
}

/// What the capture loop should do at the top of an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    Capture,
    Wait(Duration),
}

/// Shortest wait handed out while ahead of schedule
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct PacingController {
    policy: PacingPolicy,
    frame_interval: Duration,
    target_fps: u32,
    started_at: Instant,
    produced: u64,
}

impl PacingController {
    pub fn new(policy: PacingPolicy, target_fps: u32, started_at: Instant) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            policy,
            frame_interval: Duration::from_secs_f64(1.0 / target_fps as f64),
            target_fps,
            started_at,
            produced: 0,
        }
    }

    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// `floor((now - start) * target_fps)`
    pub fn expected_frame_index(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        (elapsed * self.target_fps as f64).floor() as u64
    }

    pub fn before_frame(&self, now: Instant) -> PacingDecision {
        match self.policy {
            PacingPolicy::FixedDelay => PacingDecision::Capture,
            PacingPolicy::CatchUp => {
                if self.produced < self.expected_frame_index(now) {
                    return PacingDecision::Capture;
                }
                let next_slot = self.started_at
                    + Duration::from_secs_f64((self.produced + 1) as f64 / self.target_fps as f64);
                let wait = next_slot
                    .saturating_duration_since(now)
                    .clamp(MIN_WAIT, self.frame_interval);
                PacingDecision::Wait(wait)
            }
        }
    }

    /// Record a produced frame and return how long to sleep before the next
    /// iteration, if at all.
    pub fn after_frame(&mut self, iteration_start: Instant, now: Instant) -> Option<Duration> {
        self.produced += 1;
        match self.policy {
            PacingPolicy::FixedDelay => self.throttle(iteration_start, now),
            PacingPolicy::CatchUp => None,
        }
    }

    /// Remainder of the frame period for an iteration that started at
    /// `iteration_start`, or `None` when the period is already used up
    pub fn throttle(&self, iteration_start: Instant, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(iteration_start);
        if elapsed < self.frame_interval {
            Some(self.frame_interval - elapsed)
        } else {
            None
        }
    }
}
