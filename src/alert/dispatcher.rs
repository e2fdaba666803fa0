use crate::events::{EventBus, SentryEvent};
use crate::frame::SourceId;
use image::RgbImage;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What an alert carries to the sinks
#[derive(Debug, Clone)]
pub struct AlertPayload {
    pub camera_name: String,
    pub detection_count: usize,
    pub image: Arc<RgbImage>,
    pub save_image: bool,
    pub send_message: bool,
    pub sound_alert: bool,
}

/// Queued unit of dispatch work
#[derive(Debug, Clone)]
pub struct AlertJob {
    pub alert_id: String,
    pub source_id: SourceId,
    pub triggered_at: SystemTime,
    pub payload: AlertPayload,
}

/// Outcome of [`AlertDispatcher::maybe_alert`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    /// Nothing to alert on
    NoDetections,
    /// Inside the cooldown window of the previous alert
    Suppressed { remaining: Duration },
    /// Cooldown passed and the job was queued
    Dispatched { alert_id: String },
    /// Cooldown passed but the dispatch queue was full or closed
    Dropped,
    UnknownSource,
}

/// Alert counters shared between the dispatcher and its worker
#[derive(Debug, Default)]
pub struct AlertCounters {
    pub dispatched: AtomicU64,
    pub suppressed: AtomicU64,
    pub dropped: AtomicU64,
    pub images_saved: AtomicU64,
    pub messages_sent: AtomicU64,
    pub sounds_played: AtomicU64,
    pub sink_failures: AtomicU64,
}

impl AlertCounters {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Per-source cooldown gate in front of the alert queue.
///
/// The decision and the cooldown update happen on the caller's task; the
/// actual delivery is handed to [`super::AlertWorker`] through a bounded
/// queue with `try_send`, so a slow transport never holds up the caller.
pub struct AlertDispatcher {
    cooldown: Duration,
    last_alert: HashMap<SourceId, Mutex<Option<Instant>>>,
    sender: mpsc::Sender<AlertJob>,
    counters: Arc<AlertCounters>,
    event_bus: EventBus,
}

impl AlertDispatcher {
    pub fn new<I>(
        cooldown: Duration,
        sources: I,
        queue_capacity: usize,
        event_bus: EventBus,
    ) -> (Self, mpsc::Receiver<AlertJob>)
    where
        I: IntoIterator<Item = SourceId>,
    {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let last_alert = sources
            .into_iter()
            .map(|id| (id, Mutex::new(None)))
            .collect();

        let dispatcher = Self {
            cooldown,
            last_alert,
            sender,
            counters: Arc::new(AlertCounters::default()),
            event_bus,
        };
        (dispatcher, receiver)
    }

    pub fn counters(&self) -> Arc<AlertCounters> {
        Arc::clone(&self.counters)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Gate and queue an alert for `source_id`
    pub async fn maybe_alert(
        &self,
        source_id: SourceId,
        has_detections: bool,
        now: Instant,
        payload: AlertPayload,
    ) -> AlertDecision {
        if !has_detections {
            return AlertDecision::NoDetections;
        }

        let Some(slot) = self.last_alert.get(&source_id) else {
            warn!("Alert requested for unknown source {}", source_id);
            return AlertDecision::UnknownSource;
        };

        {
            let mut last = slot.lock();
            if let Some(previous) = *last {
                let since = now.saturating_duration_since(previous);
                if since < self.cooldown {
                    drop(last);
                    AlertCounters::bump(&self.counters.suppressed);
                    debug!(
                        "Alert for source {} suppressed ({:?} into cooldown)",
                        source_id, since
                    );
                    let _ = self
                        .event_bus
                        .publish(SentryEvent::AlertSuppressed {
                            source_id,
                            reason: "cooldown".to_string(),
                        })
                        .await;
                    return AlertDecision::Suppressed {
                        remaining: self.cooldown - since,
                    };
                }
            }
            // Updated even if delivery later fails, so a flapping transport
            // cannot turn into an alert storm
            *last = Some(now);
        }

        let job = AlertJob {
            alert_id: uuid::Uuid::new_v4().to_string(),
            source_id,
            triggered_at: SystemTime::now(),
            payload,
        };
        let alert_id = job.alert_id.clone();

        match self.sender.try_send(job) {
            Ok(()) => {
                AlertCounters::bump(&self.counters.dispatched);
                info!("Alert {} queued for source {}", alert_id, source_id);
                let _ = self
                    .event_bus
                    .publish(SentryEvent::AlertDispatched {
                        source_id,
                        alert_id: alert_id.clone(),
                        timestamp: SystemTime::now(),
                    })
                    .await;
                AlertDecision::Dispatched { alert_id }
            }
            Err(e) => {
                AlertCounters::bump(&self.counters.dropped);
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "queue closed",
                };
                warn!("Alert for source {} dropped: {}", source_id, reason);
                let _ = self
                    .event_bus
                    .publish(SentryEvent::AlertSuppressed {
                        source_id,
                        reason: reason.to_string(),
                    })
                    .await;
                AlertDecision::Dropped
            }
        }
    }
}
