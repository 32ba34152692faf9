//! Slideshow state machine.
//!
//! Pure transitions over [`tokio::time::Instant`]; the manager task turns
//! the exposed deadline into a `sleep_until` arm. Intervals are re-armed
//! only after an advance completes, so ticks never overlap a pending load.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideshowState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug)]
enum Phase {
    Stopped,
    Running { deadline: Instant },
    Paused { remaining: Duration },
}

#[derive(Debug)]
pub struct Slideshow {
    interval: Duration,
    phase: Phase,
}

impl Slideshow {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            phase: Phase::Stopped,
        }
    }

    pub fn state(&self) -> SlideshowState {
        match self.phase {
            Phase::Stopped => SlideshowState::Stopped,
            Phase::Running { .. } => SlideshowState::Running,
            Phase::Paused { .. } => SlideshowState::Paused,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes effect at the next re-arm; a countdown already in progress
    /// keeps its remaining time.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Stopped starts a fresh interval; Paused continues its countdown;
    /// Running is unchanged.
    pub fn start(&mut self, now: Instant) {
        match self.phase {
            Phase::Stopped => {
                self.phase = Phase::Running {
                    deadline: now + self.interval,
                };
            }
            Phase::Paused { remaining } => {
                self.phase = Phase::Running {
                    deadline: now + remaining,
                };
            }
            Phase::Running { .. } => {}
        }
    }

    pub fn stop(&mut self) {
        self.phase = Phase::Stopped;
    }

    /// Freezes the countdown, keeping the time left within the current
    /// interval.
    pub fn pause(&mut self, now: Instant) {
        if let Phase::Running { deadline } = self.phase {
            self.phase = Phase::Paused {
                remaining: deadline.saturating_duration_since(now),
            };
        }
    }

    /// Continues a frozen countdown where it left off.
    pub fn resume(&mut self, now: Instant) {
        if let Phase::Paused { remaining } = self.phase {
            self.phase = Phase::Running {
                deadline: now + remaining,
            };
        }
    }

    /// Schedules the next tick a full interval from `now`. Called once the
    /// advance triggered by the previous tick has completed.
    pub fn rearm(&mut self, now: Instant) {
        if let Phase::Running { .. } = self.phase {
            self.phase = Phase::Running {
                deadline: now + self.interval,
            };
        }
    }

    /// When the next tick is due; `None` unless running.
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Running { deadline } => Some(deadline),
            _ => None,
        }
    }
}
