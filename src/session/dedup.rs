//! Duplicate question suppression
//!
//! The microphone sometimes hears the same utterance twice (an echo of the
//! user or a second transcription of the same speech). A question equal to
//! the immediately preceding one within the window is discarded.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct QuestionDedup {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl QuestionDedup {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Check whether `question` repeats the preceding question inside the window
    ///
    /// Does not record anything; call [`Self::record`] once a turn is created.
    #[must_use]
    pub fn is_duplicate(&self, question: &str, now: Instant) -> bool {
        self.last.as_ref().is_some_and(|(last, at)| {
            last == question && now.saturating_duration_since(*at) < self.window
        })
    }

    /// Remember `question` as the preceding question
    pub fn record(&mut self, question: &str, now: Instant) {
        self.last = Some((question.to_string(), now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_inside_window_is_duplicate() {
        let now = Instant::now();
        let mut dedup = QuestionDedup::new(Duration::from_secs(15));

        assert!(!dedup.is_duplicate("what time is it", now));
        dedup.record("what time is it", now);

        assert!(dedup.is_duplicate("what time is it", now + Duration::from_millis(100)));
        assert!(!dedup.is_duplicate("what day is it", now + Duration::from_millis(100)));
    }

    #[test]
    fn test_repeat_after_window_is_new() {
        let now = Instant::now();
        let mut dedup = QuestionDedup::new(Duration::from_secs(15));
        dedup.record("what time is it", now);

        assert!(!dedup.is_duplicate("what time is it", now + Duration::from_secs(15)));
    }

    #[test]
    fn test_only_immediately_preceding_question_counts() {
        let now = Instant::now();
        let mut dedup = QuestionDedup::new(Duration::from_secs(15));
        dedup.record("first", now);
        dedup.record("second", now + Duration::from_secs(1));

        assert!(!dedup.is_duplicate("first", now + Duration::from_secs(2)));
    }
}
