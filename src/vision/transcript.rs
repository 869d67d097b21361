//! Rolling plain-text transcript of the current session
//!
//! Recreated at every start. Appends come only from completed answer tasks,
//! and at most one answer task is in flight, so there is a single writer.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::Result;

/// Number of header lines written at the top of the file
const HEADER_LINES: usize = 3;

/// Default amount of history handed to the answer engine
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Session question/answer log
#[derive(Debug)]
pub struct SessionTranscript {
    path: PathBuf,
    max_context_chars: usize,
}

impl SessionTranscript {
    /// Create (or truncate) the transcript file and write its header
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn start(path: impl AsRef<Path>, max_context_chars: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let header = format!(
            "ADA session transcript\nStarted: {}\n{}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            "-".repeat(40)
        );
        std::fs::write(&path, header)?;

        tracing::debug!(path = %path.display(), "session transcript started");

        Ok(Self {
            path,
            max_context_chars,
        })
    }

    /// Append one question/answer exchange
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn append(&self, question: &str, answer: &str) -> Result<()> {
        let stamp = Local::now().format("%H:%M:%S");
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "[{stamp}] Question: {question}")?;
        writeln!(file, "[{stamp}] Answer: {answer}")?;
        writeln!(file)?;
        Ok(())
    }

    /// History after the header, trimmed to the most recent entries
    ///
    /// Returns an empty string when the file is missing or unreadable.
    #[must_use]
    pub fn context(&self) -> String {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session transcript");
                return String::new();
            }
        };

        let body: String = content
            .lines()
            .skip(HEADER_LINES)
            .map(|line| format!("{line}\n"))
            .collect();

        if body.len() <= self.max_context_chars {
            return body;
        }

        // Keep whole exchanges: cut at the first blank line inside the window
        let start = body.len() - self.max_context_chars;
        let start = (start..body.len())
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(body.len());
        let tail = &body[start..];
        tail.find("\n\n")
            .map_or(tail, |pos| &tail[pos + 2..])
            .to_string()
    }

    /// Path of the transcript file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
