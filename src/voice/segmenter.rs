//! Energy-based speech segmentation
//!
//! Splits a live audio stream into utterances: speech starts when the RMS
//! energy of a chunk crosses the threshold and ends after enough silence.

use std::time::{Duration, Instant};

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to count as an utterance (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Silence duration to consider end of utterance (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Speaking,
}

/// Accumulates speech until it is followed by silence
#[derive(Debug)]
pub struct SpeechSegmenter {
    state: SegmentState,
    speech_buffer: Vec<f32>,
    speech_samples: usize,
    silence_counter: usize,
    energy_threshold: f32,
}

impl Default for SpeechSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSegmenter {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_threshold(ENERGY_THRESHOLD)
    }

    /// Segmenter with a custom energy threshold
    #[must_use]
    pub const fn with_threshold(energy_threshold: f32) -> Self {
        Self {
            state: SegmentState::Idle,
            speech_buffer: Vec::new(),
            speech_samples: 0,
            silence_counter: 0,
            energy_threshold,
        }
    }

    /// Feed a chunk of samples
    ///
    /// Returns true once an utterance is complete (speech followed by silence)
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > self.energy_threshold;

        match self.state {
            SegmentState::Idle => {
                if is_speech {
                    self.state = SegmentState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.speech_samples = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
            }
            SegmentState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.is_utterance_complete() {
                    tracing::debug!(samples = self.speech_buffer.len(), "speech segment complete");
                    return true;
                }

                // Too much silence without enough speech: a click or a cough
                if self.silence_counter > SILENCE_SAMPLES * 2 {
                    tracing::trace!("noise burst discarded");
                    self.reset();
                }
            }
        }

        false
    }

    /// Whether enough speech has been buffered to be worth transcribing
    #[must_use]
    pub fn has_speech(&self) -> bool {
        self.state == SegmentState::Speaking && self.speech_samples > MIN_SPEECH_SAMPLES
    }

    /// Check if utterance capture is complete (silence after speech)
    #[must_use]
    pub fn is_utterance_complete(&self) -> bool {
        self.silence_counter > SILENCE_SAMPLES && self.has_speech()
    }

    /// Take the buffered utterance and return to idle
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.speech_buffer);
        self.reset();
        utterance
    }

    /// Reset to idle
    pub fn reset(&mut self) {
        self.state = SegmentState::Idle;
        self.speech_buffer.clear();
        self.speech_samples = 0;
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }
}

/// Pull chunks from `read_chunk` until an utterance completes or `timeout` passes
///
/// On timeout, buffered speech is returned if there is enough of it.
pub fn capture_utterance<F>(
    mut read_chunk: F,
    segmenter: &mut SpeechSegmenter,
    timeout: Duration,
) -> Option<Vec<f32>>
where
    F: FnMut() -> Vec<f32>,
{
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        let chunk = read_chunk();
        if chunk.is_empty() {
            continue;
        }
        if segmenter.process(&chunk) {
            return Some(segmenter.take_utterance());
        }
    }

    if segmenter.has_speech() {
        tracing::debug!("listen window ended mid-utterance");
        return Some(segmenter.take_utterance());
    }

    None
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
