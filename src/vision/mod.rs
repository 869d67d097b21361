//! Camera frames, capture sources and vision question answering

mod answer;
mod capture;
mod frame;
mod transcript;

pub use answer::{
    AnswerFailure, DEFAULT_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, VisionAnswerEngine,
};
pub use capture::{CaptureSource, ImageDirSource, SnapshotUrlSource, open_source};
pub use frame::{FaceBox, Frame, FrameBuffer, encode_jpeg, save_jpeg};
pub use transcript::{DEFAULT_MAX_CONTEXT_CHARS, SessionTranscript};
