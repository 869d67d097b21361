//! Frame loop integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ada::app::run_frames;
use ada::config::SessionTimings;
use ada::display::Display;
use ada::session::{Overlay, Stage};
use ada::vision::{CaptureSource, Frame, ImageDirSource, save_jpeg};
use ada::{Error, Result};

mod common;

use common::{Fakes, inline_machine};

/// Records overlays and requests shutdown after `limit` frames
struct StopAfter {
    limit: usize,
    shutdown: Arc<AtomicBool>,
    overlays: Vec<Overlay>,
}

impl Display for StopAfter {
    fn show(&mut self, _frame: &Frame, overlay: &Overlay) -> Result<()> {
        self.overlays.push(overlay.clone());
        if self.overlays.len() >= self.limit {
            self.shutdown.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct DeadCamera;

impl CaptureSource for DeadCamera {
    fn read(&mut self) -> Result<Frame> {
        Err(Error::Capture("camera unplugged".to_string()))
    }

    fn describe(&self) -> String {
        "dead camera".to_string()
    }
}

#[test]
fn test_frames_drive_the_session_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    for (i, color) in [[255, 0, 0], [0, 255, 0]].into_iter().enumerate() {
        let image = image::RgbImage::from_pixel(12, 9, image::Rgb(color));
        save_jpeg(&image, &dir.path().join(format!("frame_{i}.jpg"))).unwrap();
    }
    let mut source = ImageDirSource::open(dir.path()).unwrap();

    let fakes = Fakes::new();
    let mut machine = inline_machine(&fakes, SessionTimings::default(), std::time::Instant::now());

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut display = StopAfter {
        limit: 6,
        shutdown: Arc::clone(&shutdown),
        overlays: Vec::new(),
    };

    let frames = run_frames(
        &mut source,
        &mut machine,
        &mut display,
        &shutdown,
        Duration::ZERO,
    )
    .unwrap();

    assert_eq!(frames, 6);
    assert_eq!(display.overlays[0], Overlay::AwaitingWake);
    assert_eq!(machine.stage(), Stage::Greeting);
    assert!(display.overlays.contains(&Overlay::Identifying));
}

#[test]
fn test_capture_failure_ends_the_loop() {
    let fakes = Fakes::new();
    let mut machine = inline_machine(&fakes, SessionTimings::default(), std::time::Instant::now());
    let shutdown = AtomicBool::new(false);
    let mut display = StopAfter {
        limit: usize::MAX,
        shutdown: Arc::new(AtomicBool::new(false)),
        overlays: Vec::new(),
    };

    let result = run_frames(
        &mut DeadCamera,
        &mut machine,
        &mut display,
        &shutdown,
        Duration::ZERO,
    );

    assert!(matches!(result, Err(Error::Capture(_))));
    assert!(display.overlays.is_empty());
}

#[test]
fn test_shutdown_before_first_frame() {
    let fakes = Fakes::new();
    let mut machine = inline_machine(&fakes, SessionTimings::default(), std::time::Instant::now());
    let shutdown = AtomicBool::new(true);
    let mut display = StopAfter {
        limit: 1,
        shutdown: Arc::new(AtomicBool::new(false)),
        overlays: Vec::new(),
    };

    let frames = run_frames(
        &mut DeadCamera,
        &mut machine,
        &mut display,
        &shutdown,
        Duration::ZERO,
    )
    .unwrap();

    assert_eq!(frames, 0);
}
