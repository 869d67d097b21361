//! Video frames and the recent-frame ring buffer

use std::collections::VecDeque;
use std::io::Cursor;
use std::time::Instant;

use image::{ImageFormat, RgbImage};

use crate::{Error, Result};

/// JPEG quality used for frames sent to remote services
const JPEG_QUALITY: u8 = 85;

/// A captured video frame
///
/// Owns its pixels: cloning a frame copies the image, so a frame handed to
/// a background task can never observe later writes by the main loop.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    captured_at: Instant,
}

impl Frame {
    /// Wrap an RGB image captured at `captured_at`
    #[must_use]
    pub const fn new(image: RgbImage, captured_at: Instant) -> Self {
        Self { image, captured_at }
    }

    /// Build a frame of a single solid color (used by tests and placeholders)
    #[must_use]
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(
            RgbImage::from_pixel(width, height, image::Rgb(rgb)),
            Instant::now(),
        )
    }

    /// Decode a frame from encoded image bytes (JPEG, PNG)
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not a supported image
    pub fn decode(bytes: &[u8], captured_at: Instant) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        Ok(Self::new(image, captured_at))
    }

    /// Pixel data
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Frame width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// When the frame was captured
    #[must_use]
    pub const fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Encode the frame as JPEG
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        encode_jpeg(&self.image)
    }

    /// Copy out the region `(top, right, bottom, left)`, clamped to the frame
    ///
    /// # Errors
    ///
    /// Returns error if the clamped region is empty
    pub fn crop(&self, region: FaceBox) -> Result<RgbImage> {
        let right = region.right.min(self.width());
        let bottom = region.bottom.min(self.height());
        if region.left >= right || region.top >= bottom {
            return Err(Error::Identity(format!(
                "empty crop region {region:?} in {}x{} frame",
                self.width(),
                self.height()
            )));
        }

        Ok(image::imageops::crop_imm(
            &self.image,
            region.left,
            region.top,
            right - region.left,
            bottom - region.top,
        )
        .to_image())
    }
}

/// Face bounding box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Encode an RGB image as JPEG
///
/// # Errors
///
/// Returns error if encoding fails
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    image.write_with_encoder(encoder)?;
    Ok(cursor.into_inner())
}

/// Save an RGB image as a JPEG file
///
/// # Errors
///
/// Returns error if encoding or writing fails
pub fn save_jpeg(image: &RgbImage, path: &std::path::Path) -> Result<()> {
    image.save_with_format(path, ImageFormat::Jpeg)?;
    Ok(())
}

/// Ring buffer of the most recent frames
///
/// Owned by the main loop; background tasks receive copies via
/// [`FrameBuffer::snapshot`].
#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    max_size: usize,
}

impl FrameBuffer {
    /// Create a buffer holding at most `max_size` frames
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            frames: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Add a frame, evicting the oldest when full
    pub fn push(&mut self, frame: Frame) {
        if self.frames.len() >= self.max_size {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Most recent frame
    #[must_use]
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Copy all buffered frames, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames.iter().cloned().collect()
    }

    /// Number of buffered frames
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
