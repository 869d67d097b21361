//! Spoken question capture

use std::sync::Arc;
use std::time::Duration;

use super::capture::{SAMPLE_RATE, record_utterance, samples_to_wav};
use super::stt::SpeechToText;
use crate::Result;
use crate::session::QuestionListener;

/// Default listening window
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Records one utterance from the microphone and transcribes it
pub struct MicQuestionListener {
    stt: Arc<SpeechToText>,
    runtime: tokio::runtime::Handle,
    timeout: Duration,
}

impl MicQuestionListener {
    #[must_use]
    pub const fn new(
        stt: Arc<SpeechToText>,
        runtime: tokio::runtime::Handle,
        timeout: Duration,
    ) -> Self {
        Self {
            stt,
            runtime,
            timeout,
        }
    }
}

impl QuestionListener for MicQuestionListener {
    fn listen(&self) -> Result<Option<String>> {
        tracing::debug!(timeout_secs = self.timeout.as_secs(), "listening for user question");

        let Some(samples) = record_utterance(self.timeout)? else {
            return Ok(None);
        };

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let transcript = self.runtime.block_on(self.stt.transcribe(&wav))?;

        Ok(normalize_question(&transcript))
    }
}

/// Lower-case and trim a transcript; blank transcripts are no question
#[must_use]
pub fn normalize_question(transcript: &str) -> Option<String> {
    let question = transcript.trim().to_lowercase();
    (!question.is_empty()).then_some(question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("  What Time Is It?\n"),
            Some("what time is it?".to_string())
        );
        assert_eq!(normalize_question("   "), None);
    }
}
