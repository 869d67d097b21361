//! Session state owned by the main loop

use std::time::{Duration, Instant};

use image::RgbImage;

/// Interaction stage
///
/// Ordered by progression; a session only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    AwaitingWake,
    Identifying,
    Greeting,
    Conversing,
}

impl Stage {
    /// Stage name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingWake => "awaiting_wake",
            Self::Identifying => "identifying",
            Self::Greeting => "greeting",
            Self::Conversing => "conversing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The person this session is talking to
#[derive(Debug, Clone)]
pub struct Identity {
    pub display_name: String,
    pub is_new: bool,
    pub enrollment_pending: bool,
    pub pending_face_image: Option<RgbImage>,
}

impl Identity {
    /// A previously enrolled identity
    #[must_use]
    pub fn known(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            is_new: false,
            enrollment_pending: false,
            pending_face_image: None,
        }
    }

    /// A new face awaiting enrollment
    #[must_use]
    pub fn pending(temp_name: impl Into<String>, face_image: RgbImage) -> Self {
        Self {
            display_name: temp_name.into(),
            is_new: true,
            enrollment_pending: true,
            pending_face_image: Some(face_image),
        }
    }

    /// Apply the enrolled name; the identity is fixed afterwards
    pub fn complete_enrollment(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
        self.enrollment_pending = false;
        self.pending_face_image = None;
    }
}

/// One question/answer exchange and its display lifetime
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub id: u64,
    pub question: String,
    pub answer: Option<String>,
    pub captured_at: Instant,
    pub display_until: Instant,
    pub answer_played: bool,
}

impl ConversationTurn {
    #[must_use]
    pub fn new(id: u64, question: String, captured_at: Instant, display_for: Duration) -> Self {
        Self {
            id,
            question,
            answer: None,
            captured_at,
            display_until: captured_at + display_for,
            answer_played: false,
        }
    }

    /// Whether the turn is still on screen at `now`
    #[must_use]
    pub fn is_visible(&self, now: Instant) -> bool {
        now < self.display_until
    }
}

/// Gates listen launches and tracks forward progress
#[derive(Debug, Clone, Copy)]
pub struct CooldownClock {
    pub last_listen_start: Option<Instant>,
    pub last_recovery_reset: Instant,
}

impl CooldownClock {
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            last_listen_start: None,
            last_recovery_reset: now,
        }
    }

    /// Whether `cooldown` has passed since the last listen started
    #[must_use]
    pub fn listen_allowed(&self, now: Instant, cooldown: Duration) -> bool {
        self.last_listen_start
            .is_none_or(|start| now.saturating_duration_since(start) >= cooldown)
    }

    pub fn record_listen_start(&mut self, now: Instant) {
        self.last_listen_start = Some(now);
        self.last_recovery_reset = now;
    }

    pub fn record_progress(&mut self, now: Instant) {
        self.last_recovery_reset = now;
    }

    /// Time since the last forward progress
    #[must_use]
    pub fn stalled_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_recovery_reset)
    }
}

/// Mutable record driving the interaction
#[derive(Debug)]
pub struct SessionState {
    pub stage: Stage,
    pub stage_entered_at: Instant,
    pub identity: Option<Identity>,
    pub turn: Option<ConversationTurn>,
    pub clock: CooldownClock,
    pub ready_to_listen: bool,
    pub processing: bool,
    pub greeting_started: bool,
    pub identify_started: bool,
    /// Bumped on forced recovery; results launched under an older epoch are ignored
    pub epoch: u64,
    next_turn_id: u64,
}

impl SessionState {
    #[must_use]
    pub const fn new(now: Instant) -> Self {
        Self {
            stage: Stage::AwaitingWake,
            stage_entered_at: now,
            identity: None,
            turn: None,
            clock: CooldownClock::new(now),
            ready_to_listen: false,
            processing: false,
            greeting_started: false,
            identify_started: false,
            epoch: 0,
            next_turn_id: 1,
        }
    }

    /// Move to `next`, resetting per-stage flags
    ///
    /// Returns `false` (and changes nothing) for a backward or same-stage move.
    pub fn enter(&mut self, next: Stage, now: Instant) -> bool {
        if next <= self.stage {
            tracing::error!(from = %self.stage, to = %next, "refusing non-forward stage transition");
            return false;
        }

        tracing::info!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
        self.stage_entered_at = now;
        self.greeting_started = false;
        self.identify_started = false;

        if next == Stage::Conversing {
            self.ready_to_listen = true;
            self.processing = false;
            self.clock = CooldownClock::new(now);
        }

        true
    }

    /// Time spent in the current stage
    #[must_use]
    pub fn in_stage_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stage_entered_at)
    }

    /// Allocate the id for the next conversation turn
    pub fn next_turn_id(&mut self) -> u64 {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        id
    }

    /// Display name of the resolved identity
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.display_name.as_str())
    }
}
