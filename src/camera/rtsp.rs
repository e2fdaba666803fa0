use super::stream::VideoStream;
use crate::config::redact_endpoint;
use crate::error::CameraError;
use crate::frame::{FrameSize, SourceId};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::{ClockTime, MessageType, MessageView, Pipeline};
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use image::RgbImage;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// RTSP capture through a GStreamer pipeline ending in an RGB appsink
pub struct RtspStream {
    source_id: SourceId,
    pipeline: Pipeline,
    appsink: AppSink,
    read_timeout: Duration,
    released: bool,
}

impl RtspStream {
    fn pipeline_description(endpoint: &str, size: FrameSize, fps: u32) -> String {
        format!(
            "rtspsrc location=\"{}\" latency=0 protocols=tcp ! \
             decodebin ! videoconvert ! videoscale ! videorate ! \
             video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
             appsink name=sink sync=false max-buffers=1 drop=true",
            endpoint, size.width, size.height, fps
        )
    }

    pub async fn open(
        source_id: SourceId,
        endpoint: &str,
        size: FrameSize,
        fps: u32,
        open_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, CameraError> {
        let open_error = |details: String| CameraError::Open {
            source_id,
            details,
        };

        gstreamer::init().map_err(|e| open_error(format!("GStreamer init failed: {}", e)))?;

        info!(
            "Creating RTSP pipeline for source {} ({})",
            source_id,
            redact_endpoint(endpoint)
        );

        let pipeline = gstreamer::parse::launch(&Self::pipeline_description(endpoint, size, fps))
            .map_err(|e| open_error(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| open_error("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_error("Pipeline has no appsink".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| open_error("Failed to downcast to AppSink".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| open_error(format!("Failed to start pipeline: {}", e)))?;

        // Wait until data flows or the pipeline reports an error
        let bus_pipeline = pipeline.clone();
        let started = tokio::task::spawn_blocking(move || {
            let bus = bus_pipeline.bus()?;
            bus.timed_pop_filtered(
                ClockTime::from_mseconds(open_timeout.as_millis() as u64),
                &[MessageType::Error, MessageType::StreamStart],
            )
        })
        .await
        .map_err(|e| open_error(format!("Open task failed: {}", e)))?;

        let result = match started {
            Some(message) => match message.view() {
                MessageView::Error(err) => Err(open_error(format!(
                    "{} ({})",
                    err.error(),
                    err.debug().map(|d| d.to_string()).unwrap_or_default()
                ))),
                _ => Ok(()),
            },
            None => Err(CameraError::OpenTimeout {
                source_id,
                timeout: open_timeout,
            }),
        };

        if let Err(e) = result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(e);
        }

        debug!("RTSP pipeline for source {} is streaming", source_id);

        Ok(Self {
            source_id,
            pipeline,
            appsink,
            read_timeout,
            released: false,
        })
    }

    fn sample_to_image(&self, sample: gstreamer::Sample) -> Result<RgbImage, CameraError> {
        let invalid = |details: String| CameraError::InvalidFrame {
            source_id: self.source_id,
            details,
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| invalid("No buffer in sample".to_string()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| invalid("No caps in sample".to_string()))?;
        let info = VideoInfo::from_caps(caps)
            .map_err(|e| invalid(format!("Failed to get video info: {}", e)))?;
        let map = buffer
            .map_readable()
            .map_err(|e| invalid(format!("Failed to map buffer: {}", e)))?;

        let width = info.width();
        let height = info.height();
        let stride = info.stride()[0] as usize;
        let row_bytes = width as usize * 3;
        let data = map.as_slice();

        if stride < row_bytes || data.len() < stride * height as usize {
            return Err(invalid(format!(
                "buffer of {} bytes too small for {}x{} (stride {})",
                data.len(),
                width,
                height,
                stride
            )));
        }

        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in data.chunks(stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_bytes]);
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| invalid("pixel buffer size mismatch".to_string()))
    }
}

#[async_trait]
impl VideoStream for RtspStream {
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError> {
        if self.released {
            return Err(CameraError::Read {
                source_id: self.source_id,
                details: "stream released".to_string(),
            });
        }

        let appsink = self.appsink.clone();
        let timeout = self.read_timeout;
        let sample = tokio::task::spawn_blocking(move || {
            let sample =
                appsink.try_pull_sample(ClockTime::from_mseconds(timeout.as_millis() as u64));
            (sample, appsink.is_eos())
        })
        .await
        .map_err(|e| CameraError::Read {
            source_id: self.source_id,
            details: format!("Pull task failed: {}", e),
        })?;

        match sample {
            (Some(sample), _) => {
                let image = self.sample_to_image(sample)?;
                trace!(
                    "Source {} pulled {}x{} frame",
                    self.source_id,
                    image.width(),
                    image.height()
                );
                Ok(image)
            }
            (None, true) => Err(CameraError::EndOfStream {
                source_id: self.source_id,
            }),
            (None, false) => Err(CameraError::FrameTimeout {
                source_id: self.source_id,
                timeout,
            }),
        }
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!(
                "Failed to stop pipeline for source {}: {}",
                self.source_id, e
            );
        }
        debug!("Released RTSP pipeline for source {}", self.source_id);
    }
}

impl Drop for RtspStream {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.pipeline.set_state(gstreamer::State::Null);
        }
    }
}
