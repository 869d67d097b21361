//! Session output surface
//!
//! The session produces an [`Overlay`] per frame; a display decides how to
//! show it next to the frame.

use std::io::Write;

use crate::Result;
use crate::session::Overlay;
use crate::vision::Frame;

/// Shows frames with their overlay text
pub trait Display {
    /// Present one frame
    ///
    /// # Errors
    ///
    /// Returns error if the output cannot be written
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()>;
}

/// Writes overlay text to a terminal whenever it changes
pub struct TerminalDisplay<W: Write> {
    out: W,
    last: Vec<String>,
    frames: u64,
}

impl TerminalDisplay<std::io::Stdout> {
    /// Display on standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self {
            out,
            last: Vec::new(),
            frames: 0,
        }
    }

    /// Frames shown so far
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Consume the display and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn show(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        self.frames += 1;
        tracing::debug!(
            frame = self.frames,
            width = frame.width(),
            height = frame.height(),
            "frame"
        );

        let lines = overlay.lines();
        if lines == self.last {
            return Ok(());
        }

        writeln!(self.out, "----")?;
        for line in &lines {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()?;
        self.last = lines;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prints_only_on_change() {
        let frame = Frame::solid(4, 4, [0, 0, 0]);
        let mut display = TerminalDisplay::new(Vec::new());

        display.show(&frame, &Overlay::AwaitingWake).unwrap();
        display.show(&frame, &Overlay::AwaitingWake).unwrap();
        display.show(&frame, &Overlay::Identifying).unwrap();

        assert_eq!(display.frames(), 3);
        let text = String::from_utf8(display.into_inner()).unwrap();
        assert_eq!(text.matches("----").count(), 2);
        assert!(text.contains("Say the wake phrase to begin"));
        assert!(text.contains("Looking for a face..."));
    }
}
