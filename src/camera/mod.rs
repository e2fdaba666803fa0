mod state;
mod status;
mod stream;
mod synthetic;
mod worker;

#[cfg(all(feature = "camera", target_os = "linux"))]
mod rtsp;

#[cfg(test)]
mod tests;

pub use state::{
    ConnectionMachine, ConnectionState, MachineInput, NextStep, ReconnectPolicy, Transition,
};
pub use status::{SourceStatus, SourceStatusSnapshot, StatusBoard};
pub use stream::{EndpointOpener, StreamOpener, VideoStream};
pub use synthetic::SyntheticStream;
pub use worker::SourceWorker;
