use super::detector::{BoundingBox, Detection, Detector};
use crate::error::AnnotationError;
use crate::frame::{encode_jpeg, SourceId};
use async_trait::async_trait;
use image::RgbImage;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::trace;

const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<WireDetection>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    confidence: f32,
    #[serde(default)]
    label: Option<String>,
}

impl From<WireDetection> for Detection {
    fn from(wire: WireDetection) -> Self {
        Detection {
            bbox: BoundingBox::new(wire.x1, wire.y1, wire.x2, wire.y2),
            confidence: wire.confidence,
            label: wire.label,
        }
    }
}

/// Detector served over HTTP.
///
/// Each frame is posted as a multipart form (`frame` JPEG part plus a
/// `source_id` field) and the service answers with
/// `{"detections": [{"x1", "y1", "x2", "y2", "confidence", "label"?}]}`.
pub struct HttpDetector {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDetector {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AnnotationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// JPEG-encode a frame on the blocking pool, off the presentation task
async fn encode_frame(frame: RgbImage) -> Result<Vec<u8>, AnnotationError> {
    tokio::task::spawn_blocking(move || encode_jpeg(&frame, JPEG_QUALITY))
        .await
        .map_err(|e| AnnotationError::Encoding {
            details: format!("encoder task failed: {}", e),
        })?
        .map_err(|e| AnnotationError::Encoding {
            details: e.to_string(),
        })
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(
        &self,
        frame: &RgbImage,
        source_id: SourceId,
    ) -> Result<Vec<Detection>, AnnotationError> {
        let jpeg = encode_frame(frame.clone()).await?;

        let form = Form::new()
            .part(
                "frame",
                Part::bytes(jpeg)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")?,
            )
            .text("source_id", source_id.to_string());

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AnnotationError::Status { status, body });
        }

        let parsed: DetectResponse = resp.json().await?;
        trace!(
            "Detector returned {} detections for source {}",
            parsed.detections.len(),
            source_id
        );

        Ok(parsed.detections.into_iter().map(Detection::from).collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_parses() {
        let body = r#"{"detections":[
            {"x1": 10, "y1": 20.5, "x2": 110, "y2": 220, "confidence": 0.91},
            {"x1": 0, "y1": 0, "x2": 5, "y2": 5, "confidence": 0.4, "label": "alice"}
        ]}"#;
        let parsed: DetectResponse = serde_json::from_str(body).unwrap();
        let detections: Vec<Detection> = parsed.detections.into_iter().map(Into::into).collect();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 20.5, 110.0, 220.0));
        assert!(detections[0].label.is_none());
        assert_eq!(detections[1].label.as_deref(), Some("alice"));
    }

    #[test]
    fn test_empty_body_means_no_detections() {
        let parsed: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.detections.is_empty());
    }

    #[tokio::test]
    async fn test_frame_encoded_off_task() {
        let frame = RgbImage::from_pixel(16, 12, image::Rgb([200, 10, 10]));
        let jpeg = encode_frame(frame).await.unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let detector =
            HttpDetector::new("http://127.0.0.1:9/detect", Duration::from_millis(200)).unwrap();
        let frame = RgbImage::new(8, 8);
        assert!(detector.detect(&frame, SourceId(1)).await.is_err());
    }
}
