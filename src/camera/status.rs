use super::state::ConnectionState;
use crate::frame::SourceId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Live counters of one source, written by its worker and read by anyone
#[derive(Debug)]
pub struct SourceStatus {
    source_id: SourceId,
    name: String,
    state: AtomicU8,
    reconnect_attempts: AtomicU32,
    frames_published: AtomicU64,
    frames_skipped: AtomicU64,
    connections: AtomicU64,
    ever_streamed: AtomicBool,
    last_frame_at: Mutex<Option<Instant>>,
}

/// Point-in-time copy of a [`SourceStatus`]
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStatusSnapshot {
    pub source_id: SourceId,
    pub name: String,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub frames_published: u64,
    pub frames_skipped: u64,
    pub connections: u64,
    pub ever_streamed: bool,
    pub last_frame_age: Option<Duration>,
}

impl SourceStatus {
    pub fn new(source_id: SourceId, name: impl Into<String>) -> Self {
        Self {
            source_id,
            name: name.into(),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            reconnect_attempts: AtomicU32::new(0),
            frames_published: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            ever_streamed: AtomicBool::new(false),
            last_frame_at: Mutex::new(None),
        }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_streaming(&self) -> bool {
        self.state().is_streaming()
    }

    pub(crate) fn record_state(&self, state: ConnectionState, reconnect_attempts: u32) {
        self.state.store(state.as_u8(), Ordering::Release);
        self.reconnect_attempts
            .store(reconnect_attempts, Ordering::Relaxed);
        if state.is_streaming() {
            self.connections.fetch_add(1, Ordering::Relaxed);
            self.ever_streamed.store(true, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_attempts(&self, reconnect_attempts: u32) {
        self.reconnect_attempts
            .store(reconnect_attempts, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self, at: Instant) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        *self.last_frame_at.lock() = Some(at);
    }

    pub(crate) fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> SourceStatusSnapshot {
        SourceStatusSnapshot {
            source_id: self.source_id,
            name: self.name.clone(),
            state: self.state(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            ever_streamed: self.ever_streamed.load(Ordering::Relaxed),
            last_frame_age: self.last_frame_at.lock().map(|at| at.elapsed()),
        }
    }
}

/// Ordered set of source statuses, one per configured camera
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    sources: Vec<Arc<SourceStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source_id: SourceId, name: impl Into<String>) -> Arc<SourceStatus> {
        let status = Arc::new(SourceStatus::new(source_id, name));
        self.sources.push(Arc::clone(&status));
        status
    }

    pub fn get(&self, source_id: SourceId) -> Option<&Arc<SourceStatus>> {
        self.sources.iter().find(|s| s.source_id() == source_id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn streaming_count(&self) -> usize {
        self.sources.iter().filter(|s| s.is_streaming()).count()
    }

    pub fn snapshots(&self) -> Vec<SourceStatusSnapshot> {
        self.sources.iter().map(|s| s.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_records_transitions() {
        let status = SourceStatus::new(SourceId(3), "Porch");
        assert_eq!(status.state(), ConnectionState::Disconnected);

        status.record_state(ConnectionState::Connecting, 2);
        status.record_state(ConnectionState::Streaming, 2);
        status.record_frame(Instant::now());
        status.record_attempts(0);

        let snap = status.snapshot();
        assert_eq!(snap.state, ConnectionState::Streaming);
        assert_eq!(snap.reconnect_attempts, 0);
        assert_eq!(snap.frames_published, 1);
        assert_eq!(snap.connections, 1);
        assert!(snap.ever_streamed);
        assert!(snap.last_frame_age.is_some());
    }

    #[test]
    fn test_board_counts_streaming() {
        let mut board = StatusBoard::new();
        let a = board.register(SourceId(1), "a");
        let _b = board.register(SourceId(2), "b");

        a.record_state(ConnectionState::Streaming, 0);
        assert_eq!(board.len(), 2);
        assert_eq!(board.streaming_count(), 1);
        assert_eq!(board.get(SourceId(2)).unwrap().name(), "b");
        assert!(board.get(SourceId(9)).is_none());
    }
}
