use super::DisplaySink;
use crate::error::DisplayError;
use crate::frame::FrameSize;
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::{MessageType, MessageView, Pipeline};
use gstreamer_app::AppSrc;
use image::RgbImage;
use tracing::{debug, info, warn};

/// On-screen window fed through `appsrc ! videoconvert ! autovideosink`
pub struct WindowDisplay {
    title: String,
    size: FrameSize,
    pipeline: Pipeline,
    appsrc: AppSrc,
    closed: bool,
}

impl WindowDisplay {
    /// Build and start the output pipeline. Any failure here is an
    /// acquisition error.
    pub fn open(title: &str, size: FrameSize, fps: u32) -> Result<Self, DisplayError> {
        let acquire = |details: String| DisplayError::Acquire { details };

        gstreamer::init().map_err(|e| acquire(format!("GStreamer init failed: {}", e)))?;

        let desc = format!(
            "appsrc name=src is-live=true format=time do-timestamp=true \
             caps=video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
             queue max-size-buffers=1 leaky=downstream ! \
             videoconvert ! autovideosink sync=false",
            size.width,
            size.height,
            fps.max(1)
        );
        info!("Creating display pipeline '{}': {}", title, desc);

        let pipeline = gstreamer::parse::launch(&desc)
            .map_err(|e| acquire(format!("Failed to create display pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| acquire("Failed to downcast to Pipeline".to_string()))?;

        let appsrc = pipeline
            .by_name("src")
            .ok_or_else(|| acquire("Failed to get appsrc element".to_string()))?
            .downcast::<AppSrc>()
            .map_err(|_| acquire("Failed to downcast to AppSrc".to_string()))?;
        appsrc.set_property("block", false);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| acquire(format!("Failed to start display pipeline: {}", e)))?;

        Ok(Self {
            title: title.to_string(),
            size,
            pipeline,
            appsrc,
            closed: false,
        })
    }

    /// GStreamer RGB rows are padded to 4-byte strides
    fn to_buffer_bytes(frame: &RgbImage) -> Vec<u8> {
        let row = frame.width() as usize * 3;
        let stride = (row + 3) & !3;
        if stride == row {
            return frame.as_raw().clone();
        }

        let mut bytes = vec![0u8; stride * frame.height() as usize];
        for (dst, src) in bytes.chunks_exact_mut(stride).zip(frame.as_raw().chunks_exact(row)) {
            dst[..row].copy_from_slice(src);
        }
        bytes
    }

    fn pending_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let message = bus.pop_filtered(&[MessageType::Error, MessageType::Eos])?;
        match message.view() {
            MessageView::Error(err) => Some(err.error().to_string()),
            MessageView::Eos(..) => Some("window closed".to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl DisplaySink for WindowDisplay {
    async fn present(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        if self.closed {
            return Err(DisplayError::Present {
                details: "display closed".to_string(),
            });
        }
        if FrameSize::of(frame) != self.size {
            return Err(DisplayError::Present {
                details: format!(
                    "composite is {}x{}, window expects {}",
                    frame.width(),
                    frame.height(),
                    self.size
                ),
            });
        }
        if let Some(details) = self.pending_error() {
            return Err(DisplayError::Present { details });
        }

        let buffer = gstreamer::Buffer::from_mut_slice(Self::to_buffer_bytes(frame));
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| DisplayError::Present {
                details: format!("Failed to push frame: {:?}", e),
            })?;
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.appsrc.end_of_stream() {
            debug!("Display end-of-stream failed: {:?}", e);
        }
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop display pipeline '{}': {}", self.title, e);
        }
        info!("Display '{}' closed", self.title);
    }

    fn name(&self) -> &str {
        "window"
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.pipeline.set_state(gstreamer::State::Null);
        }
    }
}
