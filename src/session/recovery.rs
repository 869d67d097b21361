//! Post-turn recovery timer and stuck watchdog

use std::time::{Duration, Instant};

/// Waits for the spoken answer to finish before listening resumes
///
/// Armed when a turn finishes processing. Fires once speech output has been
/// seen playing and then stops, or after `grace` if playback never starts.
#[derive(Debug, Default)]
pub struct RecoveryTimer {
    armed_at: Option<Instant>,
    playback_seen: bool,
}

impl RecoveryTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            armed_at: None,
            playback_seen: false,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
        self.playback_seen = false;
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
        self.playback_seen = false;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Advance the timer; returns `true` exactly once when listening may resume
    pub fn poll(&mut self, now: Instant, speaking: bool, grace: Duration) -> bool {
        let Some(armed_at) = self.armed_at else {
            return false;
        };

        if speaking {
            self.playback_seen = true;
            return false;
        }

        if self.playback_seen || now.saturating_duration_since(armed_at) >= grace {
            self.disarm();
            return true;
        }

        false
    }
}

/// Reported when the conversation has made no progress for too long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallEvent {
    pub stalled_for: Duration,
    pub threshold: Duration,
}

/// Detects a conversation that stopped making progress
#[derive(Debug, Clone, Copy)]
pub struct StuckWatchdog {
    threshold: Duration,
}

impl StuckWatchdog {
    #[must_use]
    pub const fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Check the time since the last progress against the threshold
    #[must_use]
    pub fn check(&self, last_progress: Instant, now: Instant) -> Option<StallEvent> {
        let stalled_for = now.saturating_duration_since(last_progress);
        (stalled_for >= self.threshold).then_some(StallEvent {
            stalled_for,
            threshold: self.threshold,
        })
    }
}
