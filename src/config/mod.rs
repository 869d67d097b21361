//! Configuration management for ADA

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use self::file::AdaConfigFile;
use crate::identity::DEFAULT_MATCH_TOLERANCE;
use crate::vision::{DEFAULT_API_URL, DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::voice::{DEFAULT_LISTEN_TIMEOUT, DEFAULT_TTS_MODEL};
use crate::{Error, Result};

/// ADA assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, face crops, logs)
    pub data_dir: PathBuf,

    /// OpenAI API key, shared by vision, STT and TTS
    pub openai_api_key: Option<String>,

    /// Camera configuration
    pub capture: CaptureConfig,

    /// Wake detection configuration
    pub wake: WakeConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Vision model configuration
    pub vision: VisionConfig,

    /// Face identification configuration
    pub identity: IdentityConfig,

    /// Session timing constants
    pub timings: SessionTimings,
}

/// Frame source configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Image directory or `http(s)://` snapshot URL
    pub source: Option<String>,

    /// Delay between frames
    pub frame_interval: Duration,

    /// Timeout for a single snapshot request
    pub snapshot_timeout: Duration,
}

/// How the wake event is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WakeMode {
    /// Fires after a fixed delay
    #[default]
    Timer,
    /// Listens for a spoken phrase
    Spoken,
}

impl FromStr for WakeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timer" => Ok(Self::Timer),
            "spoken" | "voice" => Ok(Self::Spoken),
            other => Err(Error::Config(format!(
                "unknown wake mode '{other}' (expected 'timer' or 'spoken')"
            ))),
        }
    }
}

/// Wake detection configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    pub mode: WakeMode,

    /// Phrase listened for in spoken mode
    pub phrase: String,

    /// Recording window per spoken attempt
    pub listen_window: Duration,

    /// Delay before the timer detector fires
    pub timer_delay: Duration,
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model for OpenAI Whisper
    pub stt_model: String,

    /// TTS model (tts-1 or tts-1-hd)
    pub tts_model: String,

    /// TTS voice (alloy, echo, fable, onyx, nova, shimmer)
    pub tts_voice: String,

    /// TTS speed (0.25 to 4.0)
    pub tts_speed: f32,

    /// Maximum wait for a spoken question
    pub listen_timeout: Duration,

    /// Spoken language hint for transcription
    pub language: Option<String>,
}

/// Vision model configuration
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub model: String,
    pub api_url: String,
    pub max_tokens: u32,

    /// Session history handed to the model, in characters
    pub max_context_chars: usize,
}

/// Face identification configuration
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Face detection and embedding service endpoint
    pub face_service_url: String,

    /// Maximum embedding distance for a match
    pub match_tolerance: f32,
}

/// Timing constants of the session state machine
#[derive(Debug, Clone)]
pub struct SessionTimings {
    /// Repeat of the previous question within this window is ignored
    pub duplicate_suppression_window: Duration,

    /// Minimum gap between listening attempts
    pub listen_cooldown: Duration,

    /// How long a question and answer stay on screen
    pub display_duration: Duration,

    /// Time spent on the greeting screen
    pub greeting_duration: Duration,

    /// No progress for this long forces a reset
    pub stuck_threshold: Duration,

    /// Fallback re-arm delay when playback never starts
    pub playback_start_grace: Duration,

    /// Pause before listening again after a duplicate
    pub duplicate_rearm_pause: Duration,

    /// Frames handed to the identity resolver
    pub frame_history: usize,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            duplicate_suppression_window: Duration::from_secs(15),
            listen_cooldown: Duration::from_secs(3),
            display_duration: Duration::from_secs(15),
            greeting_duration: Duration::from_secs(5),
            stuck_threshold: Duration::from_secs(30),
            playback_start_grace: Duration::from_secs(2),
            duplicate_rearm_pause: Duration::from_secs(1),
            frame_history: 10,
        }
    }
}

const DEFAULT_FACE_SERVICE_URL: &str = "http://127.0.0.1:8765/faces";
const DEFAULT_WAKE_PHRASE: &str = "hey ada";
const DEFAULT_FRAME_INTERVAL_MS: u64 = 100;

impl Config {
    /// Load configuration from environment, config file and defaults
    ///
    /// # Errors
    ///
    /// Returns error if the config file or a value is invalid
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path_override)?;
        let config = Self::from_sources(fc, |key| std::env::var(key).ok())?;

        // Ensure data dir exists
        if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
            tracing::warn!(
                path = %config.data_dir.display(),
                error = %e,
                "failed to create data directory"
            );
        }

        Ok(config)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Priority is env > toml > default.
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn from_sources(fc: AdaConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = env("ADA_DATA_DIR")
            .or(fc.data_dir)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let openai_api_key = env("OPENAI_API_KEY")
            .or(fc.api_keys.openai)
            .filter(|k| !k.trim().is_empty());

        let capture = CaptureConfig {
            source: env("ADA_CAPTURE_SOURCE")
                .or(fc.capture.source)
                .filter(|s| !s.trim().is_empty()),
            frame_interval: Duration::from_millis(
                fc.capture
                    .frame_interval_ms
                    .unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
            ),
            snapshot_timeout: Duration::from_secs(fc.capture.snapshot_timeout_secs.unwrap_or(5)),
        };

        let wake = WakeConfig {
            mode: env("ADA_WAKE_MODE")
                .or(fc.wake.mode)
                .map(|m| m.parse::<WakeMode>())
                .transpose()?
                .unwrap_or_default(),
            phrase: env("ADA_WAKE_PHRASE")
                .or(fc.wake.phrase)
                .unwrap_or_else(|| DEFAULT_WAKE_PHRASE.to_string()),
            listen_window: Duration::from_secs(fc.wake.listen_window_secs.unwrap_or(5)),
            timer_delay: Duration::from_secs(fc.wake.timer_delay_secs.unwrap_or(5)),
        };

        let voice = VoiceConfig {
            stt_model: env("ADA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("ADA_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env("ADA_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            listen_timeout: fc
                .voice
                .listen_timeout_secs
                .map_or(DEFAULT_LISTEN_TIMEOUT, Duration::from_secs),
            language: fc.voice.language,
        };

        let vision = VisionConfig {
            model: env("ADA_VISION_MODEL")
                .or(fc.vision.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_url: fc
                .vision
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            max_tokens: fc.vision.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            max_context_chars: fc
                .vision
                .max_context_chars
                .unwrap_or(DEFAULT_MAX_CONTEXT_CHARS),
        };

        let identity = IdentityConfig {
            face_service_url: env("ADA_FACE_SERVICE_URL")
                .or(fc.identity.face_service_url)
                .unwrap_or_else(|| DEFAULT_FACE_SERVICE_URL.to_string()),
            match_tolerance: fc
                .identity
                .match_tolerance
                .unwrap_or(DEFAULT_MATCH_TOLERANCE),
        };

        let defaults = SessionTimings::default();
        let s = fc.session;
        let timings = SessionTimings {
            duplicate_suppression_window: seconds(
                "duplicate_suppression_window_secs",
                s.duplicate_suppression_window_secs,
                defaults.duplicate_suppression_window,
            )?,
            listen_cooldown: seconds(
                "listen_cooldown_secs",
                s.listen_cooldown_secs,
                defaults.listen_cooldown,
            )?,
            display_duration: seconds(
                "display_duration_secs",
                s.display_duration_secs,
                defaults.display_duration,
            )?,
            greeting_duration: seconds(
                "greeting_duration_secs",
                s.greeting_duration_secs,
                defaults.greeting_duration,
            )?,
            stuck_threshold: seconds(
                "stuck_threshold_secs",
                s.stuck_threshold_secs,
                defaults.stuck_threshold,
            )?,
            playback_start_grace: seconds(
                "playback_start_grace_secs",
                s.playback_start_grace_secs,
                defaults.playback_start_grace,
            )?,
            duplicate_rearm_pause: seconds(
                "duplicate_rearm_pause_secs",
                s.duplicate_rearm_pause_secs,
                defaults.duplicate_rearm_pause,
            )?,
            frame_history: s.frame_history.unwrap_or(defaults.frame_history),
        };

        let config = Self {
            data_dir,
            openai_api_key,
            capture,
            wake,
            voice,
            vision,
            identity,
            timings,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check values that would break the session at runtime
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        if !(0.25..=4.0).contains(&self.voice.tts_speed) {
            return Err(Error::Config(format!(
                "tts_speed must be between 0.25 and 4.0, got {}",
                self.voice.tts_speed
            )));
        }
        if self.identity.match_tolerance <= 0.0 {
            return Err(Error::Config("match_tolerance must be positive".to_string()));
        }
        if self.timings.frame_history == 0 {
            return Err(Error::Config("frame_history must be at least 1".to_string()));
        }
        if self.timings.stuck_threshold.is_zero() {
            return Err(Error::Config("stuck_threshold must be positive".to_string()));
        }
        if self.wake.mode == WakeMode::Spoken && self.wake.phrase.trim().is_empty() {
            return Err(Error::Config(
                "spoken wake mode needs a non-empty wake phrase".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the OpenAI key or a configuration error
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key.as_deref().ok_or_else(|| {
            Error::Config("OPENAI_API_KEY is not set (env or [api_keys] openai)".to_string())
        })
    }

    /// Return the capture source or a configuration error
    ///
    /// # Errors
    ///
    /// Returns error if no source is configured
    pub fn require_capture_source(&self) -> Result<&str> {
        self.capture.source.as_deref().ok_or_else(|| {
            Error::Config(
                "no capture source configured (ADA_CAPTURE_SOURCE or [capture] source)"
                    .to_string(),
            )
        })
    }

    /// Face database path
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("ada.db")
    }

    /// Directory for saved face crops
    #[must_use]
    pub fn faces_dir(&self) -> PathBuf {
        self.data_dir.join("faces")
    }

    /// Conversation log, appended one exchange per line
    #[must_use]
    pub fn transcript_path(&self) -> PathBuf {
        self.data_dir.join("logs").join("conversation.log")
    }

    /// Where the face shown during enrollment is written
    #[must_use]
    pub fn enrollment_preview_path(&self) -> PathBuf {
        self.data_dir.join("enrollment_preview.jpg")
    }
}

/// Default data directory: `~/.local/share/ada`
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "ada")
        .map_or_else(|| PathBuf::from(".ada"), |d| d.data_dir().to_path_buf())
}

fn seconds(field: &str, value: Option<f64>, default: Duration) -> Result<Duration> {
    value.map_or(Ok(default), |secs| {
        Duration::try_from_secs_f64(secs)
            .map_err(|e| Error::Config(format!("invalid {field} ({secs}): {e}")))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn parse(toml_text: &str) -> AdaConfigFile {
        toml::from_str(toml_text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(AdaConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.wake.mode, WakeMode::Timer);
        assert_eq!(config.wake.timer_delay, Duration::from_secs(5));
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert_eq!(config.voice.tts_voice, "alloy");
        assert_eq!(config.vision.max_tokens, 300);
        assert!((config.identity.match_tolerance - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.timings.stuck_threshold, Duration::from_secs(30));
        assert_eq!(config.timings.frame_history, 10);
        assert!(config.openai_api_key.is_none());
        assert!(config.require_openai_key().is_err());
        assert!(config.require_capture_source().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = parse(
            r#"
            [wake]
            mode = "timer"

            [vision]
            model = "gpt-4o-mini"

            [api_keys]
            openai = "file-key"
            "#,
        );
        let config = Config::from_sources(
            fc,
            env_from(&[
                ("ADA_WAKE_MODE", "spoken"),
                ("OPENAI_API_KEY", "env-key"),
                ("ADA_DATA_DIR", "/tmp/ada-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.wake.mode, WakeMode::Spoken);
        assert_eq!(config.vision.model, "gpt-4o-mini");
        assert_eq!(config.require_openai_key().unwrap(), "env-key");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/ada-test/ada.db"));
        assert_eq!(config.faces_dir(), PathBuf::from("/tmp/ada-test/faces"));
    }

    #[test]
    fn test_session_timings_from_file() {
        let fc = parse(
            r#"
            [session]
            listen_cooldown_secs = 0.5
            frame_history = 4
            "#,
        );
        let config = Config::from_sources(fc, env_from(&[])).unwrap();

        assert_eq!(config.timings.listen_cooldown, Duration::from_millis(500));
        assert_eq!(config.timings.frame_history, 4);
        assert_eq!(config.timings.greeting_duration, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let negative = parse("[session]\nstuck_threshold_secs = -1.0\n");
        assert!(Config::from_sources(negative, env_from(&[])).is_err());

        let speed = parse("[voice]\ntts_speed = 9.0\n");
        assert!(Config::from_sources(speed, env_from(&[])).is_err());

        let mode = AdaConfigFile::default();
        assert!(Config::from_sources(mode, env_from(&[("ADA_WAKE_MODE", "clap")])).is_err());
    }

    #[test]
    fn test_blank_key_is_missing() {
        let config =
            Config::from_sources(AdaConfigFile::default(), env_from(&[("OPENAI_API_KEY", "  ")]))
                .unwrap();
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_wake_mode_parse() {
        assert_eq!("Spoken".parse::<WakeMode>().unwrap(), WakeMode::Spoken);
        assert_eq!("timer".parse::<WakeMode>().unwrap(), WakeMode::Timer);
        assert!("".parse::<WakeMode>().is_err());
    }
}
