//! Voice processing module
//!
//! Microphone capture, speech segmentation, Whisper transcription, OpenAI
//! speech synthesis and playback, plus the session's voice collaborators.

mod capture;
mod listener;
mod playback;
mod segmenter;
mod speaker;
mod stt;
mod tts;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, record_utterance, samples_to_wav};
pub use listener::{DEFAULT_LISTEN_TIMEOUT, MicQuestionListener, normalize_question};
pub use playback::{AudioPlayback, decode_mp3};
pub use segmenter::{SegmentState, SpeechSegmenter, calculate_energy, capture_utterance};
pub use speaker::TtsSpeaker;
pub use stt::SpeechToText;
pub use tts::{DEFAULT_TTS_MODEL, TextToSpeech};
pub use wake_word::{SpokenWakeDetector, TimerWakeDetector, contains_wake_phrase};
