use super::keyboard_input::KeyboardInputHandler;
use super::presentation::PresentationLoop;
use super::summary::RunSummary;
use super::state::ComponentRegistry;
use super::types::ShutdownReason;
use crate::alert::{AlertCounters, AlertSinks};
use crate::annotation::{Detector, HttpDetector};
use crate::camera::{EndpointOpener, StatusBoard, StreamOpener};
use crate::config::SentryConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::frame::SourceId;
use crate::frame_store::FrameStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cloneable trigger for the orchestrator's shutdown; first caller wins
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownHandle {
    /// Returns false when shutdown was already requested
    pub async fn request(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().await.take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => false,
        }
    }
}

/// Main application coordinator owning every long-lived component
pub struct SentryOrchestrator {
    pub(super) config: SentryConfig,
    pub(super) event_bus: EventBus,
    pub(super) store: Arc<FrameStore>,
    pub(super) status_board: StatusBoard,

    // Collaborators, replaceable before start()
    pub(super) opener: Arc<dyn StreamOpener>,
    pub(super) detector: Option<Arc<dyn Detector>>,
    pub(super) alert_sinks: Option<AlertSinks>,

    // Running components
    pub(super) presentation: Option<PresentationLoop>,
    pub(super) worker_handles: Vec<(SourceId, JoinHandle<()>)>,
    pub(super) alert_handle: Option<JoinHandle<()>>,
    pub(super) alert_counters: Option<Arc<AlertCounters>>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,

    // Lifecycle management
    pub(super) components: Arc<ComponentRegistry>,
    pub(super) shutdown: ShutdownHandle,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) started_at: Option<Instant>,
    pub(super) summary: Option<RunSummary>,
}

impl SentryOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub fn new(config: SentryConfig) -> Result<Self> {
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let store = Arc::new(FrameStore::new(
            config.cameras.iter().map(|c| c.source_id()),
        ));

        let mut status_board = StatusBoard::new();
        for camera in &config.cameras {
            status_board.register(camera.source_id(), camera.name.clone());
        }

        let opener: Arc<dyn StreamOpener> = Arc::new(EndpointOpener::from_config(&config.capture));

        let detector: Option<Arc<dyn Detector>> = match &config.detection.endpoint {
            Some(endpoint) => {
                info!("Person detection via {}", endpoint);
                let detector: Arc<dyn Detector> = Arc::new(HttpDetector::new(
                    endpoint.clone(),
                    Duration::from_millis(config.detection.timeout_ms),
                )?);
                Some(detector)
            }
            None => {
                if config.cameras.iter().any(|c| c.features.human_detection) {
                    warn!("human_detection is enabled but no detection endpoint is configured");
                }
                None
            }
        };

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            store,
            status_board,
            opener,
            detector,
            alert_sinks: None,
            presentation: None,
            worker_handles: Vec::new(),
            alert_handle: None,
            alert_counters: None,
            keyboard_handler: None,
            keyboard_enabled: false,
            components: Arc::new(ComponentRegistry::default()),
            shutdown: ShutdownHandle {
                sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            },
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            started_at: None,
            summary: None,
        })
    }

    /// Replace the stream backend used by every source
    pub fn with_opener(mut self, opener: Arc<dyn StreamOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Replace (or remove) the person detector
    pub fn with_detector(mut self, detector: Option<Arc<dyn Detector>>) -> Self {
        self.detector = detector;
        self
    }

    /// Use these alert transports instead of building them from config
    pub fn with_alert_sinks(mut self, sinks: AlertSinks) -> Self {
        self.alert_sinks = Some(sinks);
        self
    }

    /// Enable or disable the keyboard quit reader
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &SentryConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn frame_store(&self) -> Arc<FrameStore> {
        Arc::clone(&self.store)
    }

    pub fn status_board(&self) -> &StatusBoard {
        &self.status_board
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Summary of the last completed run
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }
}
