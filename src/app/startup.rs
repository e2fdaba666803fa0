use super::keyboard_input::KeyboardInputHandler;
use super::presentation::PresentationLoop;
use super::{Component, ComponentState, SentryOrchestrator};
use crate::alert::{resolve_timezone, sinks_from_config, AlertDispatcher, AlertWorker};
use crate::annotation::AnnotationBridge;
use crate::camera::SourceWorker;
use crate::compositor::{layout, Compositor, OverlayStyle};
use crate::display::open_display;
use crate::error::{Result, SentryError};
use crate::frame::FrameSize;
use crate::governor::Governor;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

impl SentryOrchestrator {
    /// Register all components as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing sentrycam components");

        for component in [
            Component::Display,
            Component::Alerts,
            Component::Presentation,
            Component::Cameras,
        ] {
            self.components.register(component).await;
        }
        if self.keyboard_enabled {
            self.components.register(Component::Keyboard).await;
        }

        info!(
            "{} cameras registered, detection {}",
            self.config.cameras.len(),
            if self.detector.is_some() { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Size of the composite for the configured camera count
    pub fn composite_size(&self) -> Result<FrameSize> {
        let frame = self.config.capture.frame_size();
        layout(self.config.cameras.len(), frame)
            .map(|l| FrameSize::new(l.width, l.height))
            .ok_or_else(|| SentryError::system("No cameras configured"))
    }

    /// Acquire the display, then start alerts, cameras and the keyboard
    /// reader. Only display acquisition can fail here.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting sentrycam");
        self.started_at = Some(Instant::now());

        // Display first: without an output there is nothing to run for
        self.set_component_state(Component::Display, ComponentState::Starting)
            .await;
        let display = match open_display(&self.config.display, self.composite_size()?) {
            Ok(display) => display,
            Err(e) => {
                self.set_component_state(Component::Display, ComponentState::Failed)
                    .await;
                error!("Failed to acquire display: {}", e);
                return Err(e.into());
            }
        };
        self.set_component_state(Component::Display, ComponentState::Running)
            .await;

        // Alert dispatch
        self.set_component_state(Component::Alerts, ComponentState::Starting)
            .await;
        let (dispatcher, jobs) = AlertDispatcher::new(
            self.config.alerts.cooldown(),
            self.config.cameras.iter().map(|c| c.source_id()),
            self.config.alerts.queue_capacity,
            self.event_bus.clone(),
        );
        let sinks = match self.alert_sinks.take() {
            Some(sinks) => sinks,
            None => sinks_from_config(&self.config.alerts, &self.config.cameras),
        };
        self.alert_counters = Some(dispatcher.counters());
        self.alert_handle = Some(
            AlertWorker::new(
                jobs,
                sinks,
                resolve_timezone(&self.config.alerts.timezone),
                dispatcher.counters(),
                self.cancellation_token.clone(),
            )
            .spawn(),
        );
        self.set_component_state(Component::Alerts, ComponentState::Running)
            .await;

        // Presentation pipeline
        let style = OverlayStyle::from_config(&self.config.display);
        let bridge = AnnotationBridge::new(
            self.detector.clone(),
            &self.config.cameras,
            &self.config.detection,
            style.clone(),
            Some(Arc::new(dispatcher)),
            self.event_bus.clone(),
        );
        self.presentation = Some(PresentationLoop::new(
            Arc::clone(&self.store),
            Compositor::new(self.config.capture.frame_size(), style.clone()),
            bridge,
            Governor::from_config(&self.config.display),
            display,
            style,
            self.config.display.info_overlay,
            self.config.display.target_fps,
            self.config.display.sync_threshold(),
        ));
        self.set_component_state(Component::Presentation, ComponentState::Running)
            .await;

        // One worker per camera
        self.set_component_state(Component::Cameras, ComponentState::Starting)
            .await;
        for camera in &self.config.cameras {
            let status = self
                .status_board
                .get(camera.source_id())
                .cloned()
                .ok_or_else(|| {
                    SentryError::system(format!("Camera {} has no status entry", camera.id))
                })?;

            let worker = SourceWorker::new(
                camera,
                &self.config.capture,
                Arc::clone(&self.opener),
                Arc::clone(&self.store),
                status,
                self.event_bus.clone(),
                self.cancellation_token.clone(),
            );
            self.worker_handles
                .push((camera.source_id(), worker.spawn()));
        }
        self.set_component_state(Component::Cameras, ComponentState::Running)
            .await;
        info!("{} camera workers started", self.worker_handles.len());

        if self.keyboard_enabled {
            self.set_component_state(Component::Keyboard, ComponentState::Starting)
                .await;
            let handler = KeyboardInputHandler::new(
                self.event_bus.clone(),
                self.cancellation_token.child_token(),
            );
            handler.start();
            self.keyboard_handler = Some(handler);
            self.set_component_state(Component::Keyboard, ComponentState::Running)
                .await;
            info!("Keyboard input enabled - press q or Esc to quit");
        }

        info!("sentrycam started");
        Ok(())
    }
}
