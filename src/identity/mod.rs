//! Face identification and enrollment

mod enroll;
mod face;
mod resolver;

pub use enroll::{
    AuthorizationLevel, TerminalEnrollment, generate_unique_username, is_generated_username,
};
pub use face::{DetectedFace, FaceDetector, HttpFaceDetector, face_distance};
pub use resolver::{DEFAULT_MATCH_TOLERANCE, FaceIdentityResolver};
