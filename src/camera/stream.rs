use super::synthetic::SyntheticStream;
use crate::config::{redact_endpoint, CaptureConfig};
use crate::error::CameraError;
use crate::frame::{FrameSize, SourceId};
use async_trait::async_trait;
use image::RgbImage;
use std::time::Duration;
use tracing::debug;

/// An open capture handle producing decoded RGB frames
#[async_trait]
pub trait VideoStream: Send {
    /// Wait for the next decoded frame
    async fn next_frame(&mut self) -> Result<RgbImage, CameraError>;

    /// Release the underlying capture resources. Safe to call more than once.
    async fn release(&mut self);
}

/// Opens capture handles for endpoints
#[async_trait]
pub trait StreamOpener: Send + Sync {
    async fn open(
        &self,
        source_id: SourceId,
        endpoint: &str,
    ) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// Opener dispatching on the endpoint scheme.
///
/// `synthetic://` endpoints produce generated frames; anything else goes to
/// the GStreamer RTSP backend when the `camera` feature is compiled in.
#[derive(Debug, Clone)]
pub struct EndpointOpener {
    frame_size: FrameSize,
    fps: u32,
    #[cfg_attr(not(all(feature = "camera", target_os = "linux")), allow(dead_code))]
    open_timeout: Duration,
    #[cfg_attr(not(all(feature = "camera", target_os = "linux")), allow(dead_code))]
    read_timeout: Duration,
}

impl EndpointOpener {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            frame_size: config.frame_size(),
            fps: config.fps,
            open_timeout: config.open_timeout(),
            read_timeout: config.read_timeout(),
        }
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    async fn open_network(
        &self,
        source_id: SourceId,
        endpoint: &str,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        let stream = super::rtsp::RtspStream::open(
            source_id,
            endpoint,
            self.frame_size,
            self.fps,
            self.open_timeout,
            self.read_timeout,
        )
        .await?;
        Ok(Box::new(stream))
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    async fn open_network(
        &self,
        _source_id: SourceId,
        endpoint: &str,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        Err(CameraError::BackendUnavailable {
            endpoint: redact_endpoint(endpoint),
        })
    }
}

#[async_trait]
impl StreamOpener for EndpointOpener {
    async fn open(
        &self,
        source_id: SourceId,
        endpoint: &str,
    ) -> Result<Box<dyn VideoStream>, CameraError> {
        debug!(
            "Opening source {} at {}",
            source_id,
            redact_endpoint(endpoint)
        );

        if let Some(target) = endpoint.strip_prefix(SyntheticStream::SCHEME) {
            let stream = SyntheticStream::from_endpoint(source_id, target, self.frame_size, self.fps)?;
            return Ok(Box::new(stream));
        }

        self.open_network(source_id, endpoint).await
    }
}
