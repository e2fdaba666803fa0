use super::{SentryOrchestrator, ShutdownHandle, ShutdownReason};
use crate::error::{Result, SentryError};
use crate::events::{EventFilter, EventReceiver, SentryEvent};
use tokio::signal;
use tracing::{error, info, warn};

impl SentryOrchestrator {
    /// Run the presentation loop until a signal, quit request or fatal
    /// display error, then shut down. Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("sentrycam is running");

        let shutdown_receiver =
            self.shutdown_receiver
                .take()
                .ok_or_else(|| SentryError::System {
                    message: "Shutdown receiver already taken".to_string(),
                })?;
        let mut presentation = self.presentation.take().ok_or_else(|| SentryError::System {
            message: "Presentation loop not started".to_string(),
        })?;

        self.setup_signal_handlers();
        self.forward_shutdown_events();

        let cancel = self.cancellation_token.clone();
        let reason = tokio::select! {
            reason = shutdown_receiver => reason.unwrap_or_else(|_| {
                ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
            }),
            result = presentation.run(&cancel) => match result {
                Ok(()) => ShutdownReason::UserRequest("presentation stopped".to_string()),
                Err(e) => {
                    error!("Display failed: {}", e);
                    ShutdownReason::Error(e.to_string())
                }
            },
        };
        self.presentation = Some(presentation);

        info!("Shutdown initiated: {}", reason);

        // Connection state as it was while running, before workers stop
        let snapshots = self.status_board.snapshots();

        let shutdown_code = self.shutdown().await?;
        self.summary = Some(self.collect_summary(&snapshots));
        if let Some(summary) = &self.summary {
            info!("Run summary:\n{}", summary);
        }

        let exit_code = reason.exit_code().max(shutdown_code);
        info!("sentrycam shutdown complete (exit code {})", exit_code);
        Ok(exit_code)
    }

    /// SIGTERM and Ctrl+C both request shutdown
    fn setup_signal_handlers(&self) {
        #[cfg(unix)]
        {
            let handle = self.shutdown_handle();
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            warn!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    handle
                        .request(ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        let handle = self.shutdown_handle();
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                handle
                    .request(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }

    /// Turn `ShutdownRequested` events (keyboard quit) into a shutdown
    fn forward_shutdown_events(&self) {
        let mut receiver = EventReceiver::new(
            self.event_bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown_forwarder",
        );
        let handle: ShutdownHandle = self.shutdown_handle();
        let cancel = self.cancellation_token.clone();

        tokio::spawn(async move {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = receiver.recv() => event,
            };
            if let Ok(SentryEvent::ShutdownRequested { reason, .. }) = event {
                handle.request(ShutdownReason::UserRequest(reason)).await;
            }
        });
    }
}
