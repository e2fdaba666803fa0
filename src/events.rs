use crate::camera::ConnectionState;
use crate::error::EventBusError;
use crate::frame::SourceId;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events published by the pipeline components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SentryEvent {
    /// A source worker moved between connection states
    SourceStateChanged {
        source_id: SourceId,
        from: ConnectionState,
        to: ConnectionState,
        reconnect_attempts: u32,
        timestamp: SystemTime,
    },
    /// The detector reported at least one accepted detection
    DetectionsFound {
        source_id: SourceId,
        count: usize,
        timestamp: SystemTime,
    },
    /// An alert passed the cooldown gate and was queued
    AlertDispatched {
        source_id: SourceId,
        alert_id: String,
        timestamp: SystemTime,
    },
    /// An alert was dropped by cooldown or a full queue
    AlertSuppressed { source_id: SourceId, reason: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SentryEvent {
    pub fn state_changed(
        source_id: SourceId,
        from: ConnectionState,
        to: ConnectionState,
        reconnect_attempts: u32,
    ) -> Self {
        SentryEvent::SourceStateChanged {
            source_id,
            from,
            to,
            reconnect_attempts,
            timestamp: SystemTime::now(),
        }
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        SentryEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: reason.into(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SentryEvent::SourceStateChanged {
                source_id,
                from,
                to,
                reconnect_attempts,
                ..
            } => format!(
                "Source {} {} -> {} (attempts: {})",
                source_id, from, to, reconnect_attempts
            ),
            SentryEvent::DetectionsFound {
                source_id, count, ..
            } => format!("Source {} reported {} detection(s)", source_id, count),
            SentryEvent::AlertDispatched {
                source_id,
                alert_id,
                ..
            } => format!("Alert {} dispatched for source {}", alert_id, source_id),
            SentryEvent::AlertSuppressed { source_id, reason } => {
                format!("Alert for source {} suppressed: {}", source_id, reason)
            }
            SentryEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SentryEvent::SourceStateChanged { .. } => "source_state_changed",
            SentryEvent::DetectionsFound { .. } => "detections_found",
            SentryEvent::AlertDispatched { .. } => "alert_dispatched",
            SentryEvent::AlertSuppressed { .. } => "alert_suppressed",
            SentryEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Source the event concerns, if any
    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            SentryEvent::SourceStateChanged { source_id, .. }
            | SentryEvent::DetectionsFound { source_id, .. }
            | SentryEvent::AlertDispatched { source_id, .. }
            | SentryEvent::AlertSuppressed { source_id, .. } => Some(*source_id),
            _ => None,
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SentryEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SentryEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Fails only when nobody is subscribed; callers that merely report
    /// progress are free to ignore that.
    pub async fn publish(&self, event: SentryEvent) -> Result<usize, EventBusError> {
        match &event {
            SentryEvent::SourceStateChanged {
                source_id, from, to, ..
            } => {
                if to.is_streaming() {
                    info!("Source {} connected ({} -> {})", source_id, from, to);
                } else if from.is_streaming() {
                    warn!("Source {} lost stream ({} -> {})", source_id, from, to);
                } else {
                    debug!("{}", event.description());
                }
            }
            SentryEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    /// Events concerning one of the listed sources
    Sources(Vec<SourceId>),
}

impl EventFilter {
    pub fn matches(&self, event: &SentryEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Sources(sources) => event
                .source_id()
                .map(|id| sources.contains(&id))
                .unwrap_or(false),
        }
    }
}

/// Named receiver that only yields events passing its filter
pub struct EventReceiver {
    receiver: broadcast::Receiver<SentryEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<SentryEvent>,
        filter: EventFilter,
        name: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            filter,
            name: name.into(),
        }
    }

    /// Receive the next matching event, skipping over lag
    pub async fn recv(&mut self) -> Result<SentryEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<Option<SentryEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn detections(source: u32, count: usize) -> SentryEvent {
        SentryEvent::DetectionsFound {
            source_id: SourceId(source),
            count,
            timestamp: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(detections(1, 2)).await.unwrap();
        assert_eq!(subscriber_count, 1);

        match receiver.recv().await.unwrap() {
            SentryEvent::DetectionsFound { source_id, count, .. } => {
                assert_eq!(source_id, SourceId(1));
                assert_eq!(count, 2);
            }
            other => panic!("Unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(4);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus.publish(SentryEvent::shutdown("test")).await.is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(SentryEvent::shutdown("signal")).await.unwrap();

        for receiver in [&mut receiver1, &mut receiver2] {
            let event = timeout(Duration::from_millis(100), receiver.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.event_type(), "shutdown_requested");
        }
    }

    #[test]
    fn test_event_filter() {
        let by_type = EventFilter::EventTypes(vec!["detections_found"]);
        assert!(by_type.matches(&detections(1, 1)));
        assert!(!by_type.matches(&SentryEvent::shutdown("x")));

        let by_source = EventFilter::Sources(vec![SourceId(2)]);
        assert!(by_source.matches(&detections(2, 1)));
        assert!(!by_source.matches(&detections(1, 1)));
        assert!(!by_source.matches(&SentryEvent::shutdown("x")));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let mut filtered = EventReceiver::new(
            event_bus.subscribe(),
            EventFilter::EventTypes(vec!["source_state_changed"]),
            "test",
        );

        event_bus.publish(detections(1, 3)).await.unwrap();
        event_bus
            .publish(SentryEvent::state_changed(
                SourceId(1),
                ConnectionState::Connecting,
                ConnectionState::Streaming,
                0,
            ))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            SentryEvent::SourceStateChanged { to, .. } => {
                assert_eq!(to, ConnectionState::Streaming)
            }
            other => panic!("Unexpected event {:?}", other),
        }
        assert!(filtered.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_event_properties() {
        let event = SentryEvent::AlertSuppressed {
            source_id: SourceId(4),
            reason: "cooldown".to_string(),
        };
        assert_eq!(event.event_type(), "alert_suppressed");
        assert_eq!(event.source_id(), Some(SourceId(4)));
        assert!(event.description().contains("cooldown"));
    }
}
