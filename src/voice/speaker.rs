//! Non-blocking spoken output

use std::sync::Arc;

use super::playback::AudioPlayback;
use super::tts::TextToSpeech;
use crate::session::SpeechOutput;
use crate::task::{Spawner, TaskSlot};

/// Synthesizes and plays speech on its own task slot
///
/// `is_speaking` is true from the moment `speak` launches until playback
/// has finished, including the synthesis round-trip.
pub struct TtsSpeaker {
    tts: Arc<TextToSpeech>,
    runtime: tokio::runtime::Handle,
    slot: TaskSlot<()>,
}

impl TtsSpeaker {
    #[must_use]
    pub fn new(
        tts: Arc<TextToSpeech>,
        runtime: tokio::runtime::Handle,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        Self {
            tts,
            runtime,
            slot: TaskSlot::new("speech", spawner),
        }
    }
}

impl SpeechOutput for TtsSpeaker {
    fn speak(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        if let Some(Err(e)) = self.slot.poll_result() {
            tracing::debug!(error = %e, "previous speech failed");
        }

        let tts = Arc::clone(&self.tts);
        let runtime = self.runtime.clone();
        let owned = text.to_string();
        let started = self.slot.try_start(move || {
            let audio = runtime.block_on(tts.synthesize(&owned))?;
            AudioPlayback::new()?.play_mp3(&audio)
        });

        if started {
            tracing::debug!(chars = text.len(), "speaking");
        } else {
            tracing::warn!(text, "already speaking, dropping speech");
        }
        started
    }

    fn is_speaking(&self) -> bool {
        self.slot.is_running()
    }
}
