//! Frame capture sources
//!
//! The main loop pulls one frame per tick from a [`CaptureSource`]. A read
//! failure is fatal: the loop stops and the process exits.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::Frame;
use crate::{Error, Result};

/// Image file extensions accepted by [`ImageDirSource`]
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Supplies a continuous sequence of frames on demand
pub trait CaptureSource {
    /// Read the next frame
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot produce a frame
    fn read(&mut self) -> Result<Frame>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Cycles through the image files of a directory
pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
}

impl ImageDirSource {
    /// Open a directory of still images
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read or holds no images
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| Error::Capture(format!("cannot open {}: {e}", dir.display())))?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_image_file(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::Capture(format!(
                "no image files in {}",
                dir.display()
            )));
        }

        tracing::debug!(dir = %dir.display(), frames = files.len(), "image directory source opened");

        Ok(Self {
            dir,
            files,
            position: 0,
        })
    }
}

impl CaptureSource for ImageDirSource {
    fn read(&mut self) -> Result<Frame> {
        let path = &self.files[self.position];
        self.position = (self.position + 1) % self.files.len();

        let bytes = std::fs::read(path)
            .map_err(|e| Error::Capture(format!("failed to read {}: {e}", path.display())))?;
        Frame::decode(&bytes, Instant::now())
    }

    fn describe(&self) -> String {
        format!("image directory {}", self.dir.display())
    }
}

/// Fetches a JPEG snapshot per frame from an IP camera URL
pub struct SnapshotUrlSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl SnapshotUrlSource {
    /// Create a snapshot source
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Capture(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, url })
    }
}

impl CaptureSource for SnapshotUrlSource {
    fn read(&mut self) -> Result<Frame> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| Error::Capture(format!("snapshot request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Capture(format!("snapshot endpoint returned {status}")));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Capture(format!("failed to read snapshot: {e}")))?;
        Frame::decode(&bytes, Instant::now())
    }

    fn describe(&self) -> String {
        format!("snapshot url {}", self.url)
    }
}

/// Open the source named by `spec`: an `http(s)://` URL or a directory path
///
/// # Errors
///
/// Returns error if the source cannot be opened
pub fn open_source(spec: &str, timeout: Duration) -> Result<Box<dyn CaptureSource>> {
    if spec.starts_with("http://") || spec.starts_with("https://") {
        Ok(Box::new(SnapshotUrlSource::new(spec.to_string(), timeout)?))
    } else {
        Ok(Box::new(ImageDirSource::open(spec)?))
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
