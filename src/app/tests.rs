use super::*;
use crate::alert::AlertSinks;
use crate::annotation::{BoundingBox, Detection, Detector};
use crate::camera::ConnectionState;
use crate::config::SentryConfig;
use crate::error::{AnnotationError, SentryError};
use crate::events::SentryEvent;
use crate::frame::SourceId;
use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;

fn test_config(cameras: &[(u32, &str)]) -> SentryConfig {
    let mut toml = String::from(
        r#"
[capture]
frame_width = 64
frame_height = 48
fps = 50
reconnect_delay_ms = 20
extended_retry_delay_ms = 50

[display]
backend = "headless"
target_fps = 50
font_path = "/nonexistent/font.ttf"

[alerts]
cooldown_seconds = 60

[system]
worker_join_timeout_ms = 1000
"#,
    );
    for (id, endpoint) in cameras {
        toml.push_str(&format!(
            r#"
[[cameras]]
id = {id}
name = "cam{id}"
endpoint = "{endpoint}"

[cameras.features]
human_detection = true
confidence_threshold = 0.5
save_images = false
send_message = false
sound_alert = false
"#
        ));
    }
    SentryConfig::load_from_str(&toml).unwrap()
}

struct AlwaysPerson;

#[async_trait]
impl Detector for AlwaysPerson {
    async fn detect(
        &self,
        _frame: &RgbImage,
        _source_id: SourceId,
    ) -> Result<Vec<Detection>, AnnotationError> {
        Ok(vec![Detection {
            bbox: BoundingBox::new(5.0, 5.0, 30.0, 40.0),
            confidence: 0.9,
            label: None,
        }])
    }

    fn name(&self) -> &str {
        "always-person"
    }
}

async fn run_for(
    mut orchestrator: SentryOrchestrator,
    duration: Duration,
) -> (SentryOrchestrator, i32) {
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let handle = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        handle
            .request(ShutdownReason::UserRequest("test".to_string()))
            .await;
    });

    let code = orchestrator.run().await.unwrap();
    (orchestrator, code)
}

#[tokio::test]
async fn test_component_state_management() {
    let config = test_config(&[(0, "synthetic://a")]);
    let mut orchestrator = SentryOrchestrator::new(config).unwrap();
    orchestrator.initialize().await.unwrap();

    assert_eq!(
        orchestrator.get_component_state(Component::Cameras).await,
        Some(ComponentState::Stopped)
    );
    assert!(orchestrator.get_component_state(Component::Keyboard).await.is_none());

    orchestrator
        .set_component_state(Component::Cameras, ComponentState::Running)
        .await;
    assert_eq!(
        orchestrator.get_component_state(Component::Cameras).await,
        Some(ComponentState::Running)
    );
    let all = orchestrator.get_all_component_states().await;
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], (Component::Display, ComponentState::Stopped));
}

#[tokio::test]
async fn test_composite_size_follows_camera_count() {
    let config = test_config(
        &[(0, "synthetic://a"), (1, "synthetic://b"), (2, "synthetic://c")],
    );
    let orchestrator = SentryOrchestrator::new(config).unwrap();
    let size = orchestrator.composite_size().unwrap();
    assert_eq!((size.width, size.height), (128, 96));
}

#[tokio::test]
async fn test_run_with_synthetic_sources() {
    let config = test_config(&[(0, "synthetic://a"), (1, "synthetic://b")]);
    let orchestrator = SentryOrchestrator::new(config).unwrap();

    let (orchestrator, code) = run_for(orchestrator, Duration::from_millis(400)).await;
    assert_eq!(code, 0);

    let summary = orchestrator.summary().unwrap();
    assert_eq!(summary.total_sources, 2);
    assert_eq!(summary.connected_sources, 2);
    assert!(summary.frames_presented > 0);
    assert!(summary.frames_published > 0);
    // No detection endpoint configured
    assert_eq!(summary.frames_annotated, 0);

    for status in orchestrator.status_board().snapshots() {
        assert_eq!(status.state, ConnectionState::Terminated);
    }
    let store = orchestrator.frame_store();
    assert!(store.read(SourceId(0)).unwrap().is_none());
    assert_eq!(
        orchestrator.get_component_state(Component::Cameras).await,
        Some(ComponentState::Stopped)
    );
}

#[cfg(not(feature = "camera"))]
#[tokio::test]
async fn test_unreachable_source_shows_placeholder() {
    let config = test_config(
        &[(0, "synthetic://a"), (1, "rtsp://user:pw@10.0.0.9/stream")],
    );
    let orchestrator = SentryOrchestrator::new(config).unwrap();

    let (orchestrator, code) = run_for(orchestrator, Duration::from_millis(300)).await;
    assert_eq!(code, 0);

    let summary = orchestrator.summary().unwrap();
    assert_eq!(summary.connected_sources, 1);
    assert_eq!(summary.total_sources, 2);
    assert!(summary.frames_presented > 0);
}

#[tokio::test]
async fn test_detections_flow_into_alerts() {
    let config = test_config(&[(0, "synthetic://a")]);
    let orchestrator = SentryOrchestrator::new(config)
        .unwrap()
        .with_detector(Some(Arc::new(AlwaysPerson)))
        .with_alert_sinks(AlertSinks::default());
    let mut events = orchestrator.event_bus().subscribe();

    let (orchestrator, code) = run_for(orchestrator, Duration::from_millis(300)).await;
    assert_eq!(code, 0);

    let summary = orchestrator.summary().unwrap();
    assert!(summary.frames_annotated > 0);
    assert!(summary.total_detections > 0);
    // 60 s cooldown: exactly one alert for the single source
    assert_eq!(summary.alerts_dispatched, 1);

    let mut saw_detection = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SentryEvent::DetectionsFound { .. }) {
            saw_detection = true;
        }
    }
    assert!(saw_detection);
}

#[tokio::test]
async fn test_shutdown_event_stops_run() {
    let config = test_config(&[(0, "synthetic://a")]);
    let mut orchestrator = SentryOrchestrator::new(config).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let bus = orchestrator.event_bus().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = bus.publish(SentryEvent::shutdown("quit key pressed")).await;
    });

    let code = tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("run did not finish")
        .unwrap();
    assert_eq!(code, 0);
}

#[cfg(not(all(feature = "display", target_os = "linux")))]
#[tokio::test]
async fn test_unavailable_display_is_fatal() {
    let mut config = test_config(&[(0, "synthetic://a")]);
    config.display.backend = crate::config::DisplayBackend::Window;

    let mut orchestrator = SentryOrchestrator::new(config).unwrap();
    orchestrator.initialize().await.unwrap();
    let err = orchestrator.start().await.unwrap_err();

    assert!(matches!(err, SentryError::Display(_)));
    assert!(err.is_fatal());
    assert_eq!(
        orchestrator.get_component_state(Component::Display).await,
        Some(ComponentState::Failed)
    );
    // Acquisition failed before any worker was spawned
    assert!(orchestrator.worker_handles.is_empty());
}

#[tokio::test]
async fn test_second_shutdown_request_is_ignored() {
    let config = test_config(&[(0, "synthetic://a")]);
    let orchestrator = SentryOrchestrator::new(config).unwrap();
    let handle = orchestrator.shutdown_handle();

    assert!(handle.request(ShutdownReason::Signal("SIGINT".to_string())).await);
    assert!(!handle.request(ShutdownReason::Signal("SIGTERM".to_string())).await);
}

#[test]
fn test_shutdown_reason_exit_codes() {
    assert_eq!(ShutdownReason::Signal("SIGINT".to_string()).exit_code(), 0);
    assert_eq!(ShutdownReason::UserRequest("q".to_string()).exit_code(), 0);
    assert_eq!(ShutdownReason::Error("display".to_string()).exit_code(), 1);
}

#[test]
fn test_format_runtime() {
    assert_eq!(format_runtime(Duration::from_secs(0)), "00:00:00");
    assert_eq!(format_runtime(Duration::from_secs(3 * 3600 + 7 * 60 + 9)), "03:07:09");
    assert_eq!(format_runtime(Duration::from_secs(100 * 3600)), "100:00:00");
}

#[test]
fn test_summary_display() {
    let summary = RunSummary {
        connected_sources: 1,
        total_sources: 2,
        total_detections: 4,
        frames_annotated: 10,
        average_annotation_latency: Duration::from_millis(12),
        presentation_cycles: 50,
        average_cycle_time: Duration::from_millis(40),
        runtime: Duration::from_secs(61),
        ..RunSummary::default()
    };
    let text = summary.to_string();

    assert!(text.contains("Connected sources: 1/2 (50.0%)"));
    assert!(text.contains("Detections: 4 in 10 annotated frames"));
    assert!(text.contains("avg latency 12.0 ms"));
    assert!(text.contains("Presentation: 50 cycles (avg 40.0 ms)"));
    assert!(text.contains("Runtime: 00:01:01"));
}
