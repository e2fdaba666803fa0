use crate::annotation::{AnnotationBridge, DetectionStats};
use crate::compositor::{draw_info_overlay, Compositor, OverlayStyle};
use crate::display::{DisplaySink, DisplayStats};
use crate::error::DisplayError;
use crate::frame::FrameSize;
use crate::frame_store::FrameStore;
use crate::governor::{Governor, PacingStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Single-task loop that turns the frame store into displayed composites.
///
/// One cycle: read every slot, substitute placeholders, annotate, compose,
/// overlay, present, then sleep for the governor's delay. Only display
/// failures end the loop.
pub struct PresentationLoop {
    store: Arc<FrameStore>,
    compositor: Compositor,
    bridge: AnnotationBridge,
    governor: Governor,
    display: Box<dyn DisplaySink>,
    display_stats: DisplayStats,
    style: OverlayStyle,
    info_overlay: bool,
    target_fps: u32,
    sync_threshold: Duration,
    skew_warnings: u64,
}

impl PresentationLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<FrameStore>,
        compositor: Compositor,
        bridge: AnnotationBridge,
        governor: Governor,
        display: Box<dyn DisplaySink>,
        style: OverlayStyle,
        info_overlay: bool,
        target_fps: u32,
        sync_threshold: Duration,
    ) -> Self {
        Self {
            store,
            compositor,
            bridge,
            governor,
            display,
            display_stats: DisplayStats::default(),
            style,
            info_overlay,
            target_fps,
            sync_threshold,
            skew_warnings: 0,
        }
    }

    /// Run one presentation cycle without the trailing delay
    pub async fn run_cycle(&mut self) -> Result<(), DisplayError> {
        let samples = self.store.read_all();
        let mut panels = self.compositor.panels(samples);

        self.bridge.annotate(&mut panels).await;

        let composite = match self.compositor.compose(&panels) {
            Ok(Some(composite)) => composite,
            Ok(None) => {
                self.display_stats.record_empty_cycle();
                return Ok(());
            }
            Err(e) => {
                warn!("Skipping cycle: {}", e);
                self.display_stats.record_empty_cycle();
                return Ok(());
            }
        };

        if composite.present_count > 1 && composite.max_skew > self.sync_threshold {
            self.skew_warnings += 1;
            warn!(
                "Sources out of sync: {:?} between oldest and newest frame",
                composite.max_skew
            );
        }

        let mut image = composite.image;
        if self.info_overlay {
            draw_info_overlay(&mut image, self.target_fps, &self.style);
        }

        match self.display.present(&image).await {
            Ok(()) => {
                self.display_stats.record_present(FrameSize::of(&image));
                trace!(
                    "Presented {}x{} ({}/{} live)",
                    image.width(),
                    image.height(),
                    composite.present_count,
                    composite.source_count
                );
                Ok(())
            }
            Err(e) => {
                self.display_stats.record_present_error();
                Err(e)
            }
        }
    }

    /// Cycle until `cancel` fires or the display fails
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), DisplayError> {
        debug!("Presentation loop started on '{}'", self.display.name());

        while !cancel.is_cancelled() {
            let started = Instant::now();
            self.run_cycle().await?;
            let delay = self.governor.finish_cycle(started);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!("Presentation loop stopped");
        Ok(())
    }

    /// Release the display; called after all workers have been joined
    pub async fn close(&mut self) {
        self.display.close().await;
    }

    pub fn display_stats(&self) -> &DisplayStats {
        &self.display_stats
    }

    pub fn detection_stats(&self) -> &DetectionStats {
        self.bridge.stats()
    }

    pub fn pacing_stats(&self) -> &PacingStats {
        self.governor.stats()
    }

    pub fn skew_warnings(&self) -> u64 {
        self.skew_warnings
    }
}
