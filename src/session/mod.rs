//! Interaction state machine: wake, identify, greet, converse

mod collaborators;
mod dedup;
mod machine;
mod overlay;
mod recovery;
mod state;

pub use collaborators::{
    AnswerEngine, Enrollment, EnrollmentPrompt, IdentityRegistry, IdentityResolver, NewFace,
    QuestionListener, Resolution, SpeechOutput, WakeDetector,
};
pub use dedup::QuestionDedup;
pub use machine::{Collaborators, SessionMachine, greeting_text};
pub use overlay::{Activity, Overlay};
pub use recovery::{RecoveryTimer, StallEvent, StuckWatchdog};
pub use state::{ConversationTurn, CooldownClock, Identity, SessionState, Stage};
