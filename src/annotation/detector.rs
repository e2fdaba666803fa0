use crate::error::AnnotationError;
use crate::frame::SourceId;
use async_trait::async_trait;
use image::RgbImage;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Drawing rectangle clipped to a `width` x `height` frame, or `None`
    /// when the box lies entirely outside it
    pub fn clamped_rect(&self, width: u32, height: u32) -> Option<Rect> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;

        let (x1, x2) = (self.x1.min(self.x2), self.x1.max(self.x2));
        let (y1, y2) = (self.y1.min(self.y2), self.y1.max(self.y2));
        if x1 > max_x || y1 > max_y || x2 < 0.0 || y2 < 0.0 {
            return None;
        }

        let left = x1.clamp(0.0, max_x) as i32;
        let top = y1.clamp(0.0, max_y) as i32;
        let right = x2.clamp(0.0, max_x) as i32;
        let bottom = y2.clamp(0.0, max_y) as i32;

        Some(
            Rect::at(left, top)
                .of_size((right - left + 1) as u32, (bottom - top + 1) as u32),
        )
    }
}

/// One detected person
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    /// Identity reported by the detector, if it performs identification
    pub label: Option<String>,
}

/// Accepted detections of one frame, in detector order
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub source_id: SourceId,
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn empty(source_id: SourceId) -> Self {
        Self {
            source_id,
            detections: Vec::new(),
        }
    }

    /// Keep detections at or above `threshold`, then cap the count
    pub fn from_raw(
        source_id: SourceId,
        raw: Vec<Detection>,
        threshold: f32,
        max_detections: usize,
    ) -> Self {
        let detections = raw
            .into_iter()
            .filter(|d| d.confidence >= threshold)
            .take(max_detections)
            .collect();

        Self {
            source_id,
            detections,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }
}

/// External person detector
#[async_trait]
pub trait Detector: Send + Sync {
    /// Person detections in `frame`. Thresholding and capping are the
    /// caller's job.
    async fn detect(
        &self,
        frame: &RgbImage,
        source_id: SourceId,
    ) -> Result<Vec<Detection>, AnnotationError>;

    fn name(&self) -> &str;
}
