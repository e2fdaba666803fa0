use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageResult, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stable identifier of a camera source, taken from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SourceId {
    fn from(value: u32) -> Self {
        SourceId(value)
    }
}

/// Width and height of a frame in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn pixel_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One published frame of a source.
///
/// The pixel buffer is shared behind an `Arc` and never mutated after
/// publication; producers always publish a fresh buffer, so a reader holding
/// a sample is unaffected by later publishes.
#[derive(Debug, Clone)]
pub struct FrameSample {
    pub source_id: SourceId,
    pub image: Arc<RgbImage>,
    pub captured_at: Instant,
}

impl FrameSample {
    pub fn new(source_id: SourceId, image: RgbImage, captured_at: Instant) -> Self {
        Self {
            source_id,
            image: Arc::new(image),
            captured_at,
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::of(&self.image)
    }

    /// Time since capture
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    pub fn is_older_than(&self, duration: Duration) -> bool {
        self.age() > duration
    }
}

/// Encode an RGB frame as baseline JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut buffer, quality).encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(buffer)
}
