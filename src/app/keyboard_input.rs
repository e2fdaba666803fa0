use crate::events::{EventBus, SentryEvent};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw-mode terminal reader that turns `q`/`Esc` into a shutdown request
pub struct KeyboardInputHandler {
    event_bus: EventBus,
    cancellation_token: CancellationToken,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl KeyboardInputHandler {
    pub fn new(event_bus: EventBus, cancellation_token: CancellationToken) -> Self {
        Self {
            event_bus,
            cancellation_token,
            handle: parking_lot::Mutex::new(None),
        }
    }

    /// Start polling the terminal on a blocking thread
    pub fn start(&self) {
        let event_bus = self.event_bus.clone();
        let cancellation_token = self.cancellation_token.clone();
        let runtime_handle = Handle::current();

        let handle = task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                match event::poll(POLL_INTERVAL) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        if matches!(key_event.code, KeyCode::Char('q') | KeyCode::Esc) {
                            info!("Quit key pressed - requesting shutdown");
                            let bus = event_bus.clone();
                            runtime_handle.spawn(async move {
                                if let Err(e) = bus
                                    .publish(SentryEvent::shutdown("quit key pressed"))
                                    .await
                                {
                                    warn!("Failed to publish shutdown event: {}", e);
                                }
                            });
                            break;
                        }
                        debug!("Key pressed: {:?}", key_event.code);
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });

        *self.handle.lock() = Some(handle);
    }

    /// Stop polling and wait for the reader thread to restore the terminal
    pub async fn stop(&self) {
        self.cancellation_token.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(POLL_INTERVAL * 5, handle).await.is_err() {
                warn!("Keyboard reader did not exit in time");
            }
        }

        // Raw mode must never outlive the process
        let _ = disable_raw_mode();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_without_start() {
        let handler = KeyboardInputHandler::new(EventBus::new(8), CancellationToken::new());
        assert!(!handler.is_stopped());

        handler.stop().await;
        assert!(handler.is_stopped());
    }

    #[tokio::test]
    async fn test_parent_cancel_stops_handler() {
        let parent = CancellationToken::new();
        let handler = KeyboardInputHandler::new(EventBus::new(8), parent.child_token());

        parent.cancel();
        assert!(handler.is_stopped());
    }
}
