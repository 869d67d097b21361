//! Error types for the ADA assistant

use thiserror::Error;

/// Result type alias for ADA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the ADA assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Frame capture error (camera, snapshot URL, image directory)
    #[error("capture error: {0}")]
    Capture(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Face detection or identity resolution error
    #[error("identity error: {0}")]
    Identity(String),

    /// Enrollment prompt error
    #[error("enrollment error: {0}")]
    Enrollment(String),

    /// Background task failed or panicked
    #[error("task error: {0}")]
    Task(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Image decoding/encoding error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
