use super::DisplaySink;
use crate::error::DisplayError;
use crate::frame::FrameSize;
use async_trait::async_trait;
use image::RgbImage;
use tracing::trace;

/// Accepts composites without showing them
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    frames: u64,
    last_size: Option<FrameSize>,
    closed: bool,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    pub fn last_size(&self) -> Option<FrameSize> {
        self.last_size
    }
}

#[async_trait]
impl DisplaySink for HeadlessDisplay {
    async fn present(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Present {
                details: "display closed".to_string(),
            });
        }
        self.frames += 1;
        self.last_size = Some(FrameSize::of(frame));
        trace!("Headless frame {} ({}x{})", self.frames, frame.width(), frame.height());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }

    fn name(&self) -> &str {
        "headless"
    }
}
