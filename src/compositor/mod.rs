mod layout;
mod overlay;
mod placeholder;

pub use layout::{compose, layout, max_timestamp_skew, Layout};
pub use overlay::{draw_detections, draw_info_overlay, LabelFont, OverlayStyle};
pub use placeholder::{is_likely_placeholder, PlaceholderRenderer};

use crate::error::CompositorError;
use crate::frame::{FrameSample, FrameSize, SourceId};
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// One source's contribution to a cycle: its latest frame or a placeholder
#[derive(Debug, Clone)]
pub struct Panel {
    pub source_id: SourceId,
    pub image: Arc<RgbImage>,
    /// Capture time, `None` for placeholders
    pub captured_at: Option<Instant>,
}

impl Panel {
    pub fn is_present(&self) -> bool {
        self.captured_at.is_some()
    }
}

/// Assembled output of one presentation cycle
#[derive(Debug, Clone)]
pub struct CompositeFrame {
    pub image: RgbImage,
    /// Largest capture time difference among present sources
    pub max_skew: Duration,
    pub source_count: usize,
    pub present_count: usize,
}

/// Turns the frame store contents into a composite, substituting
/// placeholders for sources without a current sample
pub struct Compositor {
    placeholders: PlaceholderRenderer,
}

impl Compositor {
    pub fn new(frame_size: FrameSize, style: OverlayStyle) -> Self {
        Self {
            placeholders: PlaceholderRenderer::new(frame_size, style),
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        self.placeholders.size()
    }

    /// Panels in the given (source id) order
    pub fn panels(&mut self, samples: Vec<(SourceId, Option<FrameSample>)>) -> Vec<Panel> {
        let expected = self.frame_size();

        samples
            .into_iter()
            .map(|(source_id, sample)| match sample {
                Some(sample) if sample.size() == expected => Panel {
                    source_id,
                    image: sample.image,
                    captured_at: Some(sample.captured_at),
                },
                _ => Panel {
                    source_id,
                    image: self.placeholders.render(source_id),
                    captured_at: None,
                },
            })
            .collect()
    }

    pub fn compose(&self, panels: &[Panel]) -> Result<Option<CompositeFrame>, CompositorError> {
        let images: Vec<&RgbImage> = panels.iter().map(|p| p.image.as_ref()).collect();
        let Some(image) = compose(&images)? else {
            return Ok(None);
        };

        let max_skew = max_timestamp_skew(panels.iter().filter_map(|p| p.captured_at));
        let present_count = panels.iter().filter(|p| p.is_present()).count();

        trace!(
            "Composed {}x{} from {} panels ({} live)",
            image.width(),
            image.height(),
            panels.len(),
            present_count
        );

        Ok(Some(CompositeFrame {
            image,
            max_skew,
            source_count: panels.len(),
            present_count,
        }))
    }
}
