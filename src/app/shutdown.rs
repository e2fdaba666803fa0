use super::{Component, ComponentState, SentryOrchestrator};
use crate::error::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl SentryOrchestrator {
    /// Cancel every task, join it within the configured bound and release
    /// the display last. Returns 1 when any component had to be aborted.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let join_timeout = self.config.system.worker_join_timeout();
        let mut exit_code = 0;

        if let Some(keyboard) = self.keyboard_handler.take() {
            self.set_component_state(Component::Keyboard, ComponentState::Stopping)
                .await;
            keyboard.stop().await;
            self.set_component_state(Component::Keyboard, ComponentState::Stopped)
                .await;
        }

        self.set_component_state(Component::Cameras, ComponentState::Stopping)
            .await;
        let mut cameras_ok = true;
        for (source_id, handle) in std::mem::take(&mut self.worker_handles) {
            if !join_bounded(&format!("camera {}", source_id), handle, join_timeout).await {
                cameras_ok = false;
            }
        }
        self.finish_component(Component::Cameras, cameras_ok, &mut exit_code)
            .await;

        if let Some(handle) = self.alert_handle.take() {
            self.set_component_state(Component::Alerts, ComponentState::Stopping)
                .await;
            let ok = join_bounded("alerts", handle, join_timeout).await;
            self.finish_component(Component::Alerts, ok, &mut exit_code).await;
        }

        // Kept afterwards for the run summary
        if let Some(mut presentation) = self.presentation.take() {
            self.set_component_state(Component::Presentation, ComponentState::Stopped)
                .await;
            self.set_component_state(Component::Display, ComponentState::Stopping)
                .await;
            presentation.close().await;
            self.presentation = Some(presentation);
            self.set_component_state(Component::Display, ComponentState::Stopped)
                .await;
        }

        let failed = self.components.failed().await;
        if !failed.is_empty() {
            warn!("Components left in failed state: {:?}", failed);
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn finish_component(&self, component: Component, ok: bool, exit_code: &mut i32) {
        if ok {
            self.set_component_state(component, ComponentState::Stopped)
                .await;
            info!("{} component stopped", component);
        } else {
            self.set_component_state(component, ComponentState::Failed)
                .await;
            *exit_code = 1;
        }
    }
}

/// Join `handle`, aborting it if it outlives `limit`
async fn join_bounded(name: &str, mut handle: JoinHandle<()>, limit: Duration) -> bool {
    match timeout(limit, &mut handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("{} task failed: {}", name, e);
            false
        }
        Err(_) => {
            warn!("{} did not stop within {:?}, aborting", name, limit);
            handle.abort();
            false
        }
    }
}
