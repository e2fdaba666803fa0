use super::detector::{DetectionResult, Detector};
use super::stats::DetectionStats;
use crate::alert::{AlertDispatcher, AlertPayload};
use crate::compositor::{draw_detections, is_likely_placeholder, OverlayStyle, Panel};
use crate::config::{CameraDescriptor, DetectionConfig};
use crate::events::{EventBus, SentryEvent};
use crate::frame::SourceId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs the detector over flagged sources, draws the results and feeds
/// positive frames to the alert dispatcher.
///
/// Detector failures and timeouts count as "no detections" for that
/// cycle; the frame is still displayed.
pub struct AnnotationBridge {
    detector: Option<Arc<dyn Detector>>,
    cameras: HashMap<SourceId, CameraDescriptor>,
    max_detections: usize,
    placeholder_probe: u32,
    detect_timeout: Duration,
    style: OverlayStyle,
    alerts: Option<Arc<AlertDispatcher>>,
    event_bus: EventBus,
    stats: DetectionStats,
}

impl AnnotationBridge {
    pub fn new(
        detector: Option<Arc<dyn Detector>>,
        cameras: &[CameraDescriptor],
        config: &DetectionConfig,
        style: OverlayStyle,
        alerts: Option<Arc<AlertDispatcher>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            detector,
            cameras: cameras
                .iter()
                .map(|c| (c.source_id(), c.clone()))
                .collect(),
            max_detections: config.max_detections_per_frame,
            placeholder_probe: config.placeholder_probe_size,
            detect_timeout: Duration::from_millis(config.timeout_ms),
            style,
            alerts,
            event_bus,
            stats: DetectionStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.detector.is_some()
    }

    pub fn stats(&self) -> &DetectionStats {
        &self.stats
    }

    /// Annotate `panels` in place
    pub async fn annotate(&mut self, panels: &mut [Panel]) {
        let Some(detector) = self.detector.clone() else {
            return;
        };

        for panel in panels.iter_mut() {
            let Some(camera) = self.cameras.get(&panel.source_id).cloned() else {
                continue;
            };
            if !camera.features.human_detection {
                continue;
            }

            if !panel.is_present() || is_likely_placeholder(&panel.image, self.placeholder_probe) {
                self.stats.record_placeholder_skip();
                continue;
            }

            let result = self.detect(detector.as_ref(), panel, &camera).await;
            let features = &camera.features;

            draw_detections(
                Arc::make_mut(&mut panel.image),
                &result.detections,
                camera.id,
                &self.style,
                features.person_identification,
            );

            if result.is_empty() {
                continue;
            }

            let _ = self
                .event_bus
                .publish(SentryEvent::DetectionsFound {
                    source_id: panel.source_id,
                    count: result.len(),
                    timestamp: SystemTime::now(),
                })
                .await;

            if let Some(alerts) = &self.alerts {
                let payload = AlertPayload {
                    camera_name: camera.name.clone(),
                    detection_count: result.len(),
                    image: Arc::clone(&panel.image),
                    save_image: features.save_images,
                    send_message: features.send_message,
                    sound_alert: features.sound_alert,
                };
                alerts
                    .maybe_alert(panel.source_id, true, Instant::now(), payload)
                    .await;
            }
        }
    }

    async fn detect(
        &mut self,
        detector: &dyn Detector,
        panel: &Panel,
        camera: &CameraDescriptor,
    ) -> DetectionResult {
        let started = Instant::now();
        let outcome = timeout(
            self.detect_timeout,
            detector.detect(&panel.image, panel.source_id),
        )
        .await;
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(raw)) => {
                let result = DetectionResult::from_raw(
                    panel.source_id,
                    raw,
                    camera.features.confidence_threshold,
                    self.max_detections,
                );
                self.stats.record_success(result.len(), latency);
                debug!(
                    "{} found {} people on source {} in {:?}",
                    detector.name(),
                    result.len(),
                    panel.source_id,
                    latency
                );
                result
            }
            Ok(Err(e)) => {
                self.stats.record_failure(latency);
                warn!("Detection failed for source {}: {}", panel.source_id, e);
                DetectionResult::empty(panel.source_id)
            }
            Err(_) => {
                self.stats.record_failure(latency);
                warn!(
                    "Detection timed out for source {} after {:?}",
                    panel.source_id, self.detect_timeout
                );
                DetectionResult::empty(panel.source_id)
            }
        }
    }
}
