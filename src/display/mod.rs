//! Output surfaces for the composite

mod headless;
mod stats;
#[cfg(all(feature = "display", target_os = "linux"))]
mod window;

pub use headless::HeadlessDisplay;
pub use stats::DisplayStats;
#[cfg(all(feature = "display", target_os = "linux"))]
pub use window::WindowDisplay;

use crate::config::{DisplayBackend, DisplayConfig};
use crate::error::DisplayError;
use crate::frame::FrameSize;
use async_trait::async_trait;
use image::RgbImage;
use tracing::info;

/// Destination of composed frames
#[async_trait]
pub trait DisplaySink: Send {
    async fn present(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;

    /// Release the output; further presents are errors
    async fn close(&mut self);

    fn name(&self) -> &str;
}

/// Acquire the configured output for composites of `size`
pub fn open_display(
    config: &DisplayConfig,
    size: FrameSize,
) -> Result<Box<dyn DisplaySink>, DisplayError> {
    info!("Opening {:?} display for {} composites", config.backend, size);
    match config.backend {
        DisplayBackend::Headless => Ok(Box::new(HeadlessDisplay::new())),
        DisplayBackend::Window => open_window(config, size),
    }
}

#[cfg(all(feature = "display", target_os = "linux"))]
fn open_window(
    config: &DisplayConfig,
    size: FrameSize,
) -> Result<Box<dyn DisplaySink>, DisplayError> {
    Ok(Box::new(WindowDisplay::open(
        &config.window_title,
        size,
        config.target_fps,
    )?))
}

#[cfg(not(all(feature = "display", target_os = "linux")))]
fn open_window(
    _config: &DisplayConfig,
    _size: FrameSize,
) -> Result<Box<dyn DisplaySink>, DisplayError> {
    Err(DisplayError::Unsupported {
        backend: "window".to_string(),
    })
}
