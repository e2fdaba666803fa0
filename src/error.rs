use crate::frame::SourceId;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentryError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Compositor error: {0}")]
    Compositor(#[from] CompositorError),

    #[error("Annotation error: {0}")]
    Annotation(#[from] AnnotationError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Frame store error: {0}")]
    FrameStore(#[from] FrameStoreError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SentryError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether the process may keep running after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SentryError::Config(_) | SentryError::Display(_) | SentryError::System { .. }
        )
    }
}

/// Failures local to one camera source
#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Failed to open stream for source {source_id}: {details}")]
    Open { source_id: SourceId, details: String },

    #[error("Stream open for source {source_id} timed out after {timeout:?}")]
    OpenTimeout { source_id: SourceId, timeout: Duration },

    #[error("Frame read failed for source {source_id}: {details}")]
    Read { source_id: SourceId, details: String },

    #[error("No frame from source {source_id} within {timeout:?}")]
    FrameTimeout { source_id: SourceId, timeout: Duration },

    #[error("Stream for source {source_id} ended")]
    EndOfStream { source_id: SourceId },

    #[error("Invalid frame from source {source_id}: {details}")]
    InvalidFrame { source_id: SourceId, details: String },

    #[error("No capture backend available for endpoint {endpoint}")]
    BackendUnavailable { endpoint: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompositorError {
    #[error("Frame {index} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    MismatchedFrame {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("Detector request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Detector returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Frame encoding failed: {details}")]
    Encoding { details: String },

    #[error("Detector failure: {details}")]
    Backend { details: String },
}

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Image sink failed: {details}")]
    ImageSink { details: String },

    #[error("Messaging sink failed: {details}")]
    Messaging { details: String },

    #[error("Messaging sink is not configured: {details}")]
    NotConfigured { details: String },

    #[error("Audio sink failed: {details}")]
    Audio { details: String },
}

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Failed to acquire display output: {details}")]
    Acquire { details: String },

    #[error("Failed to present frame: {details}")]
    Present { details: String },

    #[error("Display backend {backend} is not compiled in")]
    Unsupported { backend: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameStoreError {
    #[error("Unknown source {source_id}")]
    UnknownSource { source_id: SourceId },
}

pub type Result<T> = std::result::Result<T, SentryError>;
