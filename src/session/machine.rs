//! Per-frame session state machine
//!
//! Driven once per captured frame from the main loop. Long-running work runs
//! on task slots; the machine only polls their outcomes and decides what may
//! start next. The enrollment prompt is the one call allowed to block here.

use std::sync::Arc;
use std::time::Instant;

use super::collaborators::{
    AnswerEngine, EnrollmentPrompt, IdentityRegistry, IdentityResolver, NewFace, QuestionListener,
    Resolution, SpeechOutput, WakeDetector,
};
use super::dedup::QuestionDedup;
use super::overlay::{Activity, Overlay};
use super::recovery::{RecoveryTimer, StuckWatchdog};
use super::state::{ConversationTurn, Identity, SessionState, Stage};
use crate::Result;
use crate::config::SessionTimings;
use crate::identity::is_generated_username;
use crate::task::{Spawner, TaskSlot};
use crate::vision::{Frame, FrameBuffer, SessionTranscript};

/// External operations used by the session
pub struct Collaborators {
    pub wake: Arc<dyn WakeDetector>,
    pub resolver: Arc<dyn IdentityResolver>,
    pub enrollment: Box<dyn EnrollmentPrompt>,
    pub registry: Box<dyn IdentityRegistry>,
    pub listener: Arc<dyn QuestionListener>,
    pub engine: Arc<dyn AnswerEngine>,
    pub speech: Arc<dyn SpeechOutput>,
}

/// Answer task bookkeeping: which turn it belongs to and under which epoch
#[derive(Debug, Clone, Copy)]
struct PendingAnswer {
    turn_id: u64,
    epoch: u64,
}

/// Coordinates wake, identification, greeting and conversation
pub struct SessionMachine {
    state: SessionState,
    timings: SessionTimings,
    frames: FrameBuffer,

    wake: Arc<dyn WakeDetector>,
    resolver: Arc<dyn IdentityResolver>,
    enrollment: Box<dyn EnrollmentPrompt>,
    registry: Box<dyn IdentityRegistry>,
    listener: Arc<dyn QuestionListener>,
    engine: Arc<dyn AnswerEngine>,
    speech: Arc<dyn SpeechOutput>,
    transcript: Option<Arc<SessionTranscript>>,

    wake_slot: TaskSlot<bool>,
    identify_slot: TaskSlot<Resolution>,
    listen_slot: TaskSlot<Option<String>>,
    answer_slot: TaskSlot<String>,

    listen_epoch: u64,
    pending_answer: Option<PendingAnswer>,
    dedup: QuestionDedup,
    recovery: RecoveryTimer,
    watchdog: StuckWatchdog,
    rearm_at: Option<Instant>,
}

impl SessionMachine {
    /// Create a machine in [`Stage::AwaitingWake`]
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        timings: SessionTimings,
        spawner: Arc<dyn Spawner>,
        now: Instant,
    ) -> Self {
        let Collaborators {
            wake,
            resolver,
            enrollment,
            registry,
            listener,
            engine,
            speech,
        } = collaborators;

        Self {
            state: SessionState::new(now),
            frames: FrameBuffer::new(timings.frame_history),
            dedup: QuestionDedup::new(timings.duplicate_suppression_window),
            watchdog: StuckWatchdog::new(timings.stuck_threshold),
            timings,
            wake,
            resolver,
            enrollment,
            registry,
            listener,
            engine,
            speech,
            transcript: None,
            wake_slot: TaskSlot::new("wake", Arc::clone(&spawner)),
            identify_slot: TaskSlot::new("identify", Arc::clone(&spawner)),
            listen_slot: TaskSlot::new("listen", Arc::clone(&spawner)),
            answer_slot: TaskSlot::new("answer", spawner),
            listen_epoch: 0,
            pending_answer: None,
            recovery: RecoveryTimer::new(),
            rearm_at: None,
        }
    }

    /// Append every answered question to `transcript`
    #[must_use]
    pub fn with_transcript(mut self, transcript: Arc<SessionTranscript>) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current stage
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.state.stage
    }

    /// Advance the session by one frame
    pub fn tick(&mut self, frame: &Frame, now: Instant) -> Overlay {
        self.frames.push(frame.clone());

        match self.state.stage {
            Stage::AwaitingWake => self.tick_awaiting_wake(now),
            Stage::Identifying => self.tick_identifying(now),
            Stage::Greeting => self.tick_greeting(now),
            Stage::Conversing => self.tick_conversing(frame, now),
        }

        self.overlay(now)
    }

    fn tick_awaiting_wake(&mut self, now: Instant) {
        match self.wake_slot.poll_result() {
            Some(Ok(true)) => {
                tracing::info!("wake phrase detected");
                self.state.enter(Stage::Identifying, now);
                return;
            }
            Some(Ok(false)) => tracing::trace!("no wake phrase yet"),
            Some(Err(e)) => {
                // Retried on the next frame
                tracing::warn!(error = %e, "wake detection failed");
                return;
            }
            None => {}
        }

        let wake = Arc::clone(&self.wake);
        if self.wake_slot.try_start(move || wake.wait_for_wake()) {
            tracing::debug!(attempt = self.wake_slot.launches(), "listening for wake phrase");
        }
    }

    fn tick_identifying(&mut self, now: Instant) {
        if let Some(outcome) = self.identify_slot.poll_result() {
            self.state.identify_started = false;
            match outcome {
                Ok(Resolution::Known { face_id, name }) => {
                    if name.trim().is_empty() {
                        tracing::warn!(face_id, "known face has no name, retrying");
                    } else {
                        tracing::info!(face_id, name, "recognized known user");
                        self.state.identity = Some(Identity::known(name));
                        self.state.enter(Stage::Greeting, now);
                        return;
                    }
                }
                Ok(Resolution::New(face)) => {
                    let prompted = Instant::now();
                    if self.enroll(&face) {
                        // The prompt blocked this tick; the greeting starts once it returned
                        self.state.enter(Stage::Greeting, now + prompted.elapsed());
                        return;
                    }
                }
                Ok(Resolution::NoFace) => tracing::debug!("no face in view, retrying"),
                Err(e) => tracing::warn!(error = %e, "identity resolution failed"),
            }
        }

        if self.state.identify_started || self.frames.is_empty() {
            return;
        }

        let resolver = Arc::clone(&self.resolver);
        let frames = self.frames.snapshot();
        if self
            .identify_slot
            .try_start(move || resolver.resolve(&frames))
        {
            self.state.identify_started = true;
        }
    }

    /// Run the enrollment prompt on this thread; returns `true` once the identity is set
    fn enroll(&mut self, face: &NewFace) -> bool {
        tracing::info!(temp_name = %face.temp_name, "new face detected, starting enrollment");
        let mut identity = Identity::pending(face.temp_name.clone(), face.face_image.clone());

        let mut enrollment = match self.enrollment.enroll(&face.face_image) {
            Ok(enrollment) => enrollment,
            Err(e) => {
                tracing::warn!(error = %e, "enrollment failed, retrying identification");
                return false;
            }
        };
        if enrollment.name.trim().is_empty() {
            enrollment.name.clone_from(&face.temp_name);
        }

        match self.registry.register(face, &enrollment) {
            Ok(face_id) => tracing::info!(
                face_id,
                name = %enrollment.name,
                authorization = %enrollment.authorization,
                "registered new user"
            ),
            Err(e) => tracing::error!(error = %e, "failed to store new identity"),
        }

        identity.complete_enrollment(enrollment.name);
        self.state.identity = Some(identity);
        true
    }

    fn tick_greeting(&mut self, now: Instant) {
        if !self.state.greeting_started {
            self.state.greeting_started = true;
            let text = greeting_text(self.state.display_name().unwrap_or_default());
            tracing::info!(text, "greeting user");
            if !self.speech.speak(&text) {
                tracing::warn!("greeting was not spoken");
            }
        }

        if self.state.in_stage_for(now) >= self.timings.greeting_duration {
            self.state.enter(Stage::Conversing, now);
        }
    }

    fn tick_conversing(&mut self, frame: &Frame, now: Instant) {
        if self.state.turn.as_ref().is_some_and(|t| !t.is_visible(now)) {
            tracing::debug!("conversation turn expired");
            self.state.turn = None;
        }

        if let Some(outcome) = self.listen_slot.poll_result() {
            self.handle_heard(outcome, frame, now);
        }

        if let Some(outcome) = self.answer_slot.poll_result() {
            self.handle_answer(outcome, now);
        }

        if self.rearm_at.is_some_and(|at| now >= at) {
            self.rearm_at = None;
            self.state.ready_to_listen = true;
            self.state.clock.record_progress(now);
        }

        if self
            .recovery
            .poll(now, self.speech.is_speaking(), self.timings.playback_start_grace)
        {
            tracing::debug!("ready to listen");
            self.state.ready_to_listen = true;
            self.state.clock.record_progress(now);
        }

        if (self.state.processing || !self.state.ready_to_listen)
            && let Some(stall) = self
                .watchdog
                .check(self.state.clock.last_recovery_reset, now)
        {
            tracing::warn!(
                stalled_secs = stall.stalled_for.as_secs(),
                threshold_secs = stall.threshold.as_secs(),
                "conversation stalled, forcing recovery"
            );
            self.force_reset(now);
            return;
        }

        if self.can_solicit(now) {
            self.solicit(now);
        }
    }

    fn can_solicit(&self, now: Instant) -> bool {
        self.state.ready_to_listen
            && !self.state.processing
            && !self.listen_slot.is_running()
            && !self.answer_slot.is_running()
            && !self.speech.is_speaking()
            && self
                .state
                .clock
                .listen_allowed(now, self.timings.listen_cooldown)
    }

    fn solicit(&mut self, now: Instant) {
        self.state.processing = true;
        self.state.ready_to_listen = false;
        if let Some(turn) = self.state.turn.as_mut() {
            turn.answer = None;
        }
        self.state.clock.record_listen_start(now);
        self.listen_epoch = self.state.epoch;

        let listener = Arc::clone(&self.listener);
        if self.listen_slot.try_start(move || listener.listen()) {
            tracing::debug!("listening for question");
        } else {
            self.finish_processing(now);
        }
    }

    fn handle_heard(&mut self, outcome: Result<Option<String>>, frame: &Frame, now: Instant) {
        if self.listen_epoch != self.state.epoch {
            tracing::debug!("ignoring listen result from before recovery");
            return;
        }

        let question = match outcome {
            Ok(Some(text)) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::debug!("no question heard");
                self.finish_processing(now);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "question capture failed");
                self.finish_processing(now);
                return;
            }
        };

        if self.dedup.is_duplicate(&question, now) {
            tracing::info!(question, "ignoring duplicate question");
            self.state.processing = false;
            self.rearm_at = Some(now + self.timings.duplicate_rearm_pause);
            self.state.clock.record_progress(now);
            return;
        }

        self.start_answer(question, frame, now);
    }

    fn start_answer(&mut self, question: String, frame: &Frame, now: Instant) {
        let turn_id = self.state.next_turn_id();
        let engine = Arc::clone(&self.engine);
        let transcript = self.transcript.clone();
        let snapshot = frame.clone();
        let asked = question.clone();

        let started = self.answer_slot.try_start(move || {
            let answer = engine.answer(&snapshot, &asked);
            if let Some(transcript) = transcript
                && let Err(e) = transcript.append(&asked, &answer)
            {
                tracing::warn!(error = %e, "failed to append to session transcript");
            }
            Ok(answer)
        });

        if !started {
            tracing::warn!(question, "answer engine still busy, dropping question");
            self.finish_processing(now);
            return;
        }

        tracing::info!(turn_id, question, "question received");
        self.pending_answer = Some(PendingAnswer {
            turn_id,
            epoch: self.state.epoch,
        });
        self.dedup.record(&question, now);
        self.state.turn = Some(ConversationTurn::new(
            turn_id,
            question,
            now,
            self.timings.display_duration,
        ));
        self.state.clock.record_progress(now);
    }

    fn handle_answer(&mut self, outcome: Result<String>, now: Instant) {
        let Some(pending) = self.pending_answer.take() else {
            return;
        };
        if pending.epoch != self.state.epoch {
            tracing::debug!(turn_id = pending.turn_id, "ignoring answer from before recovery");
            return;
        }

        self.finish_processing(now);

        let answer = match outcome {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, turn_id = pending.turn_id, "answer failed");
                return;
            }
        };

        let Some(turn) = self
            .state
            .turn
            .as_mut()
            .filter(|t| t.id == pending.turn_id && t.is_visible(now))
        else {
            tracing::debug!(turn_id = pending.turn_id, "turn no longer displayed, dropping answer");
            return;
        };

        turn.answer = Some(answer.clone());
        if !answer.trim().is_empty() && !turn.answer_played {
            if self.speech.speak(&answer) {
                turn.answer_played = true;
                tracing::info!(turn_id = turn.id, "speaking answer");
            } else {
                tracing::warn!(turn_id = turn.id, "speech output busy, answer not spoken");
            }
        }
    }

    /// Turn processing ended: arm recovery so listening resumes after speech
    fn finish_processing(&mut self, now: Instant) {
        self.state.processing = false;
        self.recovery.arm(now);
        self.state.clock.record_progress(now);
    }

    fn force_reset(&mut self, now: Instant) {
        self.state.ready_to_listen = true;
        self.state.processing = false;
        self.state.epoch += 1;
        self.recovery.disarm();
        self.rearm_at = None;
        self.state.clock.record_progress(now);
    }

    fn overlay(&self, now: Instant) -> Overlay {
        match self.state.stage {
            Stage::AwaitingWake => Overlay::AwaitingWake,
            Stage::Identifying => Overlay::Identifying,
            Stage::Greeting => Overlay::Greeting {
                name: self.state.display_name().unwrap_or_default().to_string(),
            },
            Stage::Conversing => {
                let activity = if self.speech.is_speaking() {
                    Activity::Speaking
                } else if self.listen_slot.is_running() {
                    Activity::Listening
                } else if self.state.processing {
                    Activity::Thinking
                } else if self.state.ready_to_listen {
                    Activity::Ready
                } else {
                    Activity::Waiting
                };
                let turn = self.state.turn.as_ref().filter(|t| t.is_visible(now));

                Overlay::Conversing {
                    activity,
                    question: turn.map(|t| t.question.clone()),
                    answer: turn.and_then(|t| t.answer.clone()),
                }
            }
        }
    }
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("state", &self.state)
            .field("wake_slot", &self.wake_slot)
            .field("identify_slot", &self.identify_slot)
            .field("listen_slot", &self.listen_slot)
            .field("answer_slot", &self.answer_slot)
            .finish_non_exhaustive()
    }
}

/// Spoken greeting for `name`; generated guest names get the generic one
#[must_use]
pub fn greeting_text(name: &str) -> String {
    if name.is_empty() || is_generated_username(name) {
        "Welcome to ADA, your personal digital assistant.".to_string()
    } else {
        format!("Hello {name}, welcome to ADA, your personal digital assistant.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_uses_name() {
        assert_eq!(
            greeting_text("Alice"),
            "Hello Alice, welcome to ADA, your personal digital assistant."
        );
    }

    #[test]
    fn test_greeting_for_generated_name_is_generic() {
        assert_eq!(
            greeting_text("User_20260101120000_abc123"),
            "Welcome to ADA, your personal digital assistant."
        );
    }
}
