use super::state::{ConnectionMachine, MachineInput, NextStep, ReconnectPolicy};
use super::status::SourceStatus;
use super::stream::{StreamOpener, VideoStream};
use crate::config::{CameraDescriptor, CaptureConfig};
use crate::error::CameraError;
use crate::events::{EventBus, SentryEvent};
use crate::frame::{FrameSize, SourceId};
use crate::frame_store::FrameStore;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Acquisition task of one camera source.
///
/// Owns the source's connection machine and capture handle, and is the only
/// writer of the source's [`FrameStore`] slot.
pub struct SourceWorker {
    source_id: SourceId,
    name: String,
    endpoint: String,
    redacted_endpoint: String,
    frame_size: FrameSize,
    open_timeout: Duration,
    read_timeout: Duration,
    machine: ConnectionMachine,
    opener: Arc<dyn StreamOpener>,
    store: Arc<FrameStore>,
    status: Arc<SourceStatus>,
    event_bus: EventBus,
    cancel: CancellationToken,
}

impl SourceWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: &CameraDescriptor,
        capture: &CaptureConfig,
        opener: Arc<dyn StreamOpener>,
        store: Arc<FrameStore>,
        status: Arc<SourceStatus>,
        event_bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        let source_id = camera.source_id();
        Self {
            source_id,
            name: camera.name.clone(),
            endpoint: camera.endpoint.clone(),
            redacted_endpoint: camera.redacted_endpoint(),
            frame_size: capture.frame_size(),
            open_timeout: capture.open_timeout(),
            read_timeout: capture.read_timeout(),
            machine: ConnectionMachine::new(source_id, ReconnectPolicy::from_config(capture)),
            opener,
            store,
            status,
            event_bus,
            cancel,
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the connection machine until cancelled
    pub async fn run(mut self) {
        info!(
            "Starting worker for source {} '{}' ({})",
            self.source_id, self.name, self.redacted_endpoint
        );

        let mut stream: Option<Box<dyn VideoStream>> = None;
        let policy = *self.machine.policy();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.machine.next_step() {
                NextStep::Open => {
                    self.apply(MachineInput::Connect).await;

                    let opened = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        result = tokio::time::timeout(
                            self.open_timeout,
                            self.opener.open(self.source_id, &self.endpoint),
                        ) => result.unwrap_or(Err(CameraError::OpenTimeout {
                            source_id: self.source_id,
                            timeout: self.open_timeout,
                        })),
                    };

                    match opened {
                        Ok(handle) => {
                            stream = Some(handle);
                            self.apply(MachineInput::Opened).await;
                        }
                        Err(e) => {
                            warn!(
                                "Source {} open failed (attempt {}): {}",
                                self.source_id,
                                self.machine.reconnect_attempts() + 1,
                                e
                            );
                            self.apply(MachineInput::OpenFailed).await;
                            if !self.pause(policy.reconnect_delay).await {
                                break;
                            }
                        }
                    }
                }

                NextStep::Read => {
                    let Some(active) = stream.as_mut() else {
                        self.apply(MachineInput::ReadFailed).await;
                        continue;
                    };

                    let read = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        result = tokio::time::timeout(self.read_timeout, active.next_frame()) => {
                            result.unwrap_or(Err(CameraError::FrameTimeout {
                                source_id: self.source_id,
                                timeout: self.read_timeout,
                            }))
                        }
                    };

                    match read {
                        Ok(image) => self.handle_frame(image),
                        Err(CameraError::InvalidFrame { details, .. }) => {
                            // Decode anomaly: keep the previous frame on display
                            debug!("Source {} skipped invalid frame: {}", self.source_id, details);
                            self.status.record_skipped();
                        }
                        Err(e) => {
                            warn!("Source {} read failed: {}", self.source_id, e);
                            if let Some(mut handle) = stream.take() {
                                handle.release().await;
                            }
                            self.clear_slot();
                            self.apply(MachineInput::ReadFailed).await;
                            if !self.pause(policy.reconnect_delay).await {
                                break;
                            }
                        }
                    }
                }

                NextStep::EnterBackoff => {
                    warn!(
                        "Source {} failed after {} attempts, retrying in {:?}",
                        self.source_id, policy.max_reconnect_attempts, policy.extended_retry_delay
                    );
                    self.apply(MachineInput::BudgetExhausted).await;
                }

                NextStep::Wait(delay) => {
                    if !self.pause(delay).await {
                        break;
                    }
                    self.apply(MachineInput::BackoffElapsed).await;
                }

                NextStep::Stop => break,
            }
        }

        if let Some(mut handle) = stream.take() {
            handle.release().await;
        }
        self.clear_slot();
        self.apply(MachineInput::Shutdown).await;

        info!("Worker for source {} stopped", self.source_id);
    }

    fn handle_frame(&mut self, image: RgbImage) {
        self.machine.apply(MachineInput::FrameRead);
        self.status.record_attempts(self.machine.reconnect_attempts());

        let captured_at = Instant::now();
        let frame = match self.normalize(image) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Source {}: {}", self.source_id, e);
                self.status.record_skipped();
                return;
            }
        };

        match self.store.publish(self.source_id, frame, captured_at) {
            Ok(()) => {
                self.status.record_frame(captured_at);
                trace!("Source {} published frame", self.source_id);
            }
            Err(e) => error!("Source {} publish failed: {}", self.source_id, e),
        }
    }

    /// Resize to the configured frame size, rejecting empty frames
    fn normalize(&self, image: RgbImage) -> Result<RgbImage, CameraError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CameraError::InvalidFrame {
                source_id: self.source_id,
                details: "empty frame".to_string(),
            });
        }

        if FrameSize::of(&image) == self.frame_size {
            return Ok(image);
        }

        Ok(imageops::resize(
            &image,
            self.frame_size.width,
            self.frame_size.height,
            FilterType::Triangle,
        ))
    }

    fn clear_slot(&self) {
        if let Err(e) = self.store.clear(self.source_id) {
            error!("Source {} clear failed: {}", self.source_id, e);
        }
    }

    async fn apply(&mut self, input: MachineInput) {
        let Some(transition) = self.machine.apply(input) else {
            return;
        };

        self.status
            .record_state(transition.to, transition.reconnect_attempts);
        debug!(
            "Source {} {} -> {} (attempts: {})",
            self.source_id, transition.from, transition.to, transition.reconnect_attempts
        );

        // Nobody listening is fine
        let _ = self
            .event_bus
            .publish(SentryEvent::state_changed(
                self.source_id,
                transition.from,
                transition.to,
                transition.reconnect_attempts,
            ))
            .await;
    }

    /// Sleep unless cancelled first; returns false on cancellation
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
