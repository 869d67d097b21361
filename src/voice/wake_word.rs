//! Wake phrase detection
//!
//! Two detectors: a fixed timer for hands-free demos, and a spoken one that
//! records a short window, transcribes it and looks for the wake phrase.

use std::sync::Arc;
use std::time::Duration;

use super::capture::{SAMPLE_RATE, record_utterance, samples_to_wav};
use super::stt::SpeechToText;
use crate::Result;
use crate::session::WakeDetector;

/// Reports a detection after a fixed delay
#[derive(Debug, Clone, Copy)]
pub struct TimerWakeDetector {
    delay: Duration,
}

impl TimerWakeDetector {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl WakeDetector for TimerWakeDetector {
    fn wait_for_wake(&self) -> Result<bool> {
        tracing::info!(delay_secs = self.delay.as_secs(), "wake timer started");
        std::thread::sleep(self.delay);
        tracing::info!("wake timer elapsed");
        Ok(true)
    }
}

/// Listens for a spoken wake phrase
pub struct SpokenWakeDetector {
    phrases: Vec<String>,
    stt: Arc<SpeechToText>,
    runtime: tokio::runtime::Handle,
    window: Duration,
}

impl SpokenWakeDetector {
    /// Create a detector for any of `phrases`
    #[must_use]
    pub fn new(
        phrases: Vec<String>,
        stt: Arc<SpeechToText>,
        runtime: tokio::runtime::Handle,
        window: Duration,
    ) -> Self {
        let phrases: Vec<String> = phrases
            .iter()
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(phrases = ?phrases, "wake phrase detector initialized");

        Self {
            phrases,
            stt,
            runtime,
            window,
        }
    }
}

impl WakeDetector for SpokenWakeDetector {
    fn wait_for_wake(&self) -> Result<bool> {
        let Some(samples) = record_utterance(self.window)? else {
            return Ok(false);
        };

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let transcript = self.runtime.block_on(self.stt.transcribe(&wav))?;

        let detected = contains_wake_phrase(&transcript, &self.phrases);
        if detected {
            tracing::info!(transcript, "wake phrase detected");
        } else {
            tracing::debug!(transcript, "speech without wake phrase");
        }
        Ok(detected)
    }
}

/// Check a transcript for any of the wake phrases
///
/// Case and punctuation are ignored.
#[must_use]
pub fn contains_wake_phrase(transcript: &str, phrases: &[String]) -> bool {
    let transcript = normalize(transcript);
    phrases
        .iter()
        .map(|p| normalize(p))
        .any(|p| !p.is_empty() && transcript.contains(&p))
}

fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
