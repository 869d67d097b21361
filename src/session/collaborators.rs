//! Contracts for the external operations the session drives
//!
//! Everything except [`EnrollmentPrompt`] and [`IdentityRegistry`] runs on
//! background task slots and must bound its own wait.

use image::RgbImage;

use crate::Result;
use crate::identity::AuthorizationLevel;
use crate::vision::Frame;

/// Blocks until the wake phrase is heard or its listening window ends
pub trait WakeDetector: Send + Sync {
    /// Returns `true` when the wake phrase was heard
    ///
    /// # Errors
    ///
    /// Returns error if audio capture or recognition fails
    fn wait_for_wake(&self) -> Result<bool>;
}

/// A face seen for the first time
#[derive(Debug, Clone)]
pub struct NewFace {
    /// Temporary `User_...` name used until enrollment completes
    pub temp_name: String,
    pub face_image: RgbImage,
    pub embedding: Vec<f32>,
}

/// Outcome of inspecting recent frames for a face
#[derive(Debug, Clone)]
pub enum Resolution {
    Known { face_id: String, name: String },
    New(NewFace),
    NoFace,
}

/// Maps the face in view to a known or new identity
pub trait IdentityResolver: Send + Sync {
    /// Inspect `frames` (oldest first)
    ///
    /// # Errors
    ///
    /// Returns error if face detection fails
    fn resolve(&self, frames: &[Frame]) -> Result<Resolution>;
}

/// Details collected when enrolling a new identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub name: String,
    pub authorization: AuthorizationLevel,
}

impl Enrollment {
    /// Anonymous enrollment: the session keeps the face's temporary name
    #[must_use]
    pub const fn guest() -> Self {
        Self {
            name: String::new(),
            authorization: AuthorizationLevel::Guest,
        }
    }
}

/// Collects a name and authorization level for a new face
///
/// Runs on the main thread and may block it.
pub trait EnrollmentPrompt {
    /// # Errors
    ///
    /// Returns error if the prompt cannot be shown
    fn enroll(&mut self, face_image: &RgbImage) -> Result<Enrollment>;
}

/// Persists enrolled identities for future matching
pub trait IdentityRegistry {
    /// Store the face and return its stable identifier
    ///
    /// # Errors
    ///
    /// Returns error if the identity cannot be stored
    fn register(&self, face: &NewFace, enrollment: &Enrollment) -> Result<String>;
}

/// Captures and transcribes one spoken question
pub trait QuestionListener: Send + Sync {
    /// Returns `None` when nothing was said before the listening window ended
    ///
    /// # Errors
    ///
    /// Returns error if capture or transcription fails
    fn listen(&self) -> Result<Option<String>>;
}

/// Answers a question about a frame
///
/// Never fails: implementations substitute an apology for any error.
pub trait AnswerEngine: Send + Sync {
    fn answer(&self, frame: &Frame, question: &str) -> String;
}

/// Speaks text without blocking the caller
pub trait SpeechOutput: Send + Sync {
    /// Start speaking `text`; returns `false` if it was dropped
    fn speak(&self, text: &str) -> bool;

    /// Whether audio is currently playing
    fn is_speaking(&self) -> bool;
}
