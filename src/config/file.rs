//! TOML configuration file loading
//!
//! Supports `~/.config/ada/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct AdaConfigFile {
    /// Directory for the database, face crops and logs
    pub data_dir: Option<String>,

    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    #[serde(default)]
    pub capture: CaptureFileConfig,

    #[serde(default)]
    pub wake: WakeFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,

    #[serde(default)]
    pub vision: VisionFileConfig,

    #[serde(default)]
    pub identity: IdentityFileConfig,

    #[serde(default)]
    pub session: SessionFileConfig,
}

/// API keys for external services
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Frame capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    /// Image directory or snapshot URL
    pub source: Option<String>,

    /// Delay between frames
    pub frame_interval_ms: Option<u64>,

    /// Snapshot request timeout
    pub snapshot_timeout_secs: Option<u64>,
}

/// Wake detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// "timer" or "spoken"
    pub mode: Option<String>,

    /// Phrase listened for in spoken mode
    pub phrase: Option<String>,

    /// Listening window per spoken attempt
    pub listen_window_secs: Option<u64>,

    /// Delay before the timer reports a wake
    pub timer_delay_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Maximum wait for a spoken question
    pub listen_timeout_secs: Option<u64>,

    /// Spoken language hint for transcription (ISO-639-1)
    pub language: Option<String>,
}

/// Vision model configuration
#[derive(Debug, Default, Deserialize)]
pub struct VisionFileConfig {
    pub model: Option<String>,
    pub api_url: Option<String>,
    pub max_tokens: Option<u32>,

    /// Session history handed to the model
    pub max_context_chars: Option<usize>,
}

/// Face identification configuration
#[derive(Debug, Default, Deserialize)]
pub struct IdentityFileConfig {
    pub face_service_url: Option<String>,
    pub match_tolerance: Option<f32>,
}

/// Session timing overrides, in seconds
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub duplicate_suppression_window_secs: Option<f64>,
    pub listen_cooldown_secs: Option<f64>,
    pub display_duration_secs: Option<f64>,
    pub greeting_duration_secs: Option<f64>,
    pub stuck_threshold_secs: Option<f64>,
    pub playback_start_grace_secs: Option<f64>,
    pub duplicate_rearm_pause_secs: Option<f64>,
    pub frame_history: Option<usize>,
}

/// Load the TOML config file
///
/// An explicit `path` must exist and parse. Without one, the standard path
/// is used and a missing or broken file falls back to defaults.
///
/// # Errors
///
/// Returns error if an explicitly given file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<AdaConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(AdaConfigFile::default());
    };

    if !path.exists() {
        return Ok(AdaConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(AdaConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(AdaConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/ada/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ada").map(|d| d.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let config: AdaConfigFile = toml::from_str(
            r#"
            [wake]
            mode = "spoken"
            phrase = "hey ada"

            [session]
            stuck_threshold_secs = 45.5
            "#,
        )
        .unwrap();

        assert_eq!(config.wake.mode.as_deref(), Some("spoken"));
        assert_eq!(config.session.stuck_threshold_secs, Some(45.5));
        assert!(config.capture.source.is_none());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_file(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[vision]\nmodel = \"gpt-4o-mini\"\n").unwrap();

        let config = load_config_file(Some(&path)).unwrap();
        assert_eq!(config.vision.model.as_deref(), Some("gpt-4o-mini"));
    }
}
