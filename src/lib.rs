pub mod alert;
pub mod annotation;
pub mod app;
pub mod camera;
pub mod compositor;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod frame;
pub mod frame_store;
pub mod governor;

pub use app::{Component, ComponentState, RunSummary, SentryOrchestrator, ShutdownHandle, ShutdownReason};
pub use config::{CameraDescriptor, CameraFeatures, SentryConfig};
pub use error::{Result, SentryError};
pub use events::{EventBus, EventFilter, EventReceiver, SentryEvent};
pub use frame::{FrameSample, FrameSize, SourceId};
pub use frame_store::FrameStore;
